//! Audit context and audit trail records

use serde::{Deserialize, Serialize};

use crate::capability::{Capability, CapabilitySet};
use crate::error::{ClResult, Error};
use crate::types::{ScopeId, SettingScope, Timestamp};

/// Who is making a request and from where
///
/// Built by the caller-facing layer from the identity provider's answer and carried
/// unchanged into every audit record and action execution record the request produces.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditContext {
	pub actor_id: Option<Box<str>>,
	pub actor_name: Option<Box<str>>,
	pub remote_addr: Option<Box<str>>,
	pub user_agent: Option<Box<str>>,
	#[serde(skip)]
	pub capabilities: CapabilitySet,
}

impl AuditContext {
	pub fn new(actor_id: impl Into<Box<str>>, actor_name: impl Into<Box<str>>) -> Self {
		Self {
			actor_id: Some(actor_id.into()),
			actor_name: Some(actor_name.into()),
			..Default::default()
		}
	}

	/// Context for work the process does on its own behalf (startup, retention purge)
	pub fn system() -> Self {
		Self {
			actor_name: Some("system".into()),
			capabilities: [Capability::Admin].into_iter().collect(),
			..Default::default()
		}
	}

	pub fn with_origin(
		mut self,
		remote_addr: Option<impl Into<Box<str>>>,
		user_agent: Option<impl Into<Box<str>>>,
	) -> Self {
		self.remote_addr = remote_addr.map(Into::into);
		self.user_agent = user_agent.map(Into::into);
		self
	}

	pub fn with_capabilities(mut self, caps: impl IntoIterator<Item = Capability>) -> Self {
		self.capabilities = caps.into_iter().collect();
		self
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditKind {
	#[serde(rename = "set")]
	Set,
	#[serde(rename = "delete")]
	Delete,
	#[serde(rename = "restore")]
	Restore,
}

impl AuditKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			AuditKind::Set => "set",
			AuditKind::Delete => "delete",
			AuditKind::Restore => "restore",
		}
	}

	pub fn parse(s: &str) -> ClResult<Self> {
		match s {
			"set" => Ok(AuditKind::Set),
			"delete" => Ok(AuditKind::Delete),
			"restore" => Ok(AuditKind::Restore),
			_ => Err(Error::DbError),
		}
	}
}

/// One immutable state transition of an override
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
	pub audit_id: u64,
	pub key: Box<str>,
	pub scope: SettingScope,
	pub scope_id: Option<ScopeId>,
	pub old_value: Option<serde_json::Value>,
	pub new_value: Option<serde_json::Value>,
	pub actor_id: Option<Box<str>>,
	pub actor_name: Option<Box<str>>,
	pub remote_addr: Option<Box<str>>,
	pub user_agent: Option<Box<str>>,
	pub kind: AuditKind,
	pub created_at: Timestamp,
}

// vim: ts=4
