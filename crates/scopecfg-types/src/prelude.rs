pub use crate::audit::{AuditContext, AuditEntry, AuditKind};
pub use crate::capability::{Capability, CapabilitySet};
pub use crate::error::{ClResult, Error};
pub use crate::types::{ScopeContext, ScopeId, SettingScope, Timestamp};

pub use tracing::{debug, debug_span, error, error_span, info, info_span, warn, warn_span};

// vim: ts=4
