pub use scopecfg_types::prelude::*;

// vim: ts=4
