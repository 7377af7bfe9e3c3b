//! scopecfg keeps configuration for fleets of devices.
//!
//! # Features
//!
//! - Three override scopes on top of a static default
//!     - device beats tenant, tenant beats system
//!     - values are typed and validated against their definition
//! - Soft delete with restore, and a scheduled purge after a retention window
//! - Append-only audit trail of every change, with actor and origin
//! - Named administrative actions with an execution history
//! - Single SQLite file storage

// Re-export shared types and the adapter trait from scopecfg-types
pub use scopecfg_types::audit;
pub use scopecfg_types::capability;
pub use scopecfg_types::error;
pub use scopecfg_types::settings_adapter;
pub use scopecfg_types::types;

// Core re-exports
pub use scopecfg_core::action;
pub use scopecfg_core::builtin;
pub use scopecfg_core::settings;

pub use scopecfg_settings_adapter_sqlite::SettingsAdapterSqlite;

// Local modules
pub mod app;
pub mod prelude;
pub mod retention;

pub use app::{App, AppBuilder, AppBuilderOpts, AppState, VERSION};

// vim: ts=4
