//! Error type shared by every scopecfg crate

use std::fmt;

pub type ClResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	/// The setting key is not registered
	DefinitionNotFound(Box<str>),
	/// Scope / scope id mismatch, scope not allowed for the setting, or an illegal deletion
	InvalidScope(String),
	/// The value does not satisfy the definition's type or validation rule
	ValidationFailed(String),
	/// The caller lacks the capability the definition requires
	PermissionDenied,
	/// Delete or restore target does not exist in the required state
	OverrideNotFound,
	/// The action key is not registered
	ActionNotFound(Box<str>),
	/// The action handler reported a failure. The message is the handler's own.
	ActionExecutionFailed(String),
	/// The caller cancelled an action before it completed
	Cancelled,
	/// An action did not complete within its time limit
	Timeout,
	/// Opaque storage failure. Details are logged where the failure happens.
	DbError,
	ConfigError(String),

	// externals
	Io(std::io::Error),
}

impl Error {
	/// Errors caused by the request itself. These are terminal and must not be retried.
	pub fn is_caller_error(&self) -> bool {
		matches!(
			self,
			Error::DefinitionNotFound(_)
				| Error::InvalidScope(_)
				| Error::ValidationFailed(_)
				| Error::PermissionDenied
				| Error::OverrideNotFound
				| Error::ActionNotFound(_)
				| Error::ActionExecutionFailed(_)
				| Error::Cancelled
		)
	}
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Error::DefinitionNotFound(key) => write!(f, "setting not found: {}", key),
			Error::InvalidScope(msg) => write!(f, "invalid scope: {}", msg),
			Error::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
			Error::PermissionDenied => write!(f, "permission denied"),
			Error::OverrideNotFound => write!(f, "override not found"),
			Error::ActionNotFound(key) => write!(f, "action not found: {}", key),
			// Handler messages are passed through untouched
			Error::ActionExecutionFailed(msg) => write!(f, "{}", msg),
			Error::Cancelled => write!(f, "cancelled"),
			Error::Timeout => write!(f, "timeout"),
			Error::DbError => write!(f, "internal storage error"),
			Error::ConfigError(msg) => write!(f, "configuration error: {}", msg),
			Error::Io(err) => write!(f, "io error: {}", err),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Io(err) => Some(err),
			_ => None,
		}
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Self::ValidationFailed(format!("invalid JSON value: {}", err))
	}
}


// vim: ts=4
