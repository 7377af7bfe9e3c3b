//! Primitive types: timestamps, scope identifiers and scope contexts

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ClResult, Error};

/// Seconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
	pub fn now() -> Self {
		Self(chrono::Utc::now().timestamp())
	}

	/// Timestamp `days` whole days before this one
	pub fn sub_days(self, days: u32) -> Self {
		Self(self.0 - i64::from(days) * 86_400)
	}
}

impl fmt::Display for Timestamp {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Identifier of a tenant or device, depending on the scope it is used with
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(pub i64);

impl fmt::Display for ScopeId {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Level at which a setting value may be overridden, broadest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SettingScope {
	#[serde(rename = "system")]
	System,
	#[serde(rename = "tenant")]
	Tenant,
	#[serde(rename = "device")]
	Device,
}

impl SettingScope {
	pub fn as_str(&self) -> &'static str {
		match self {
			SettingScope::System => "system",
			SettingScope::Tenant => "tenant",
			SettingScope::Device => "device",
		}
	}

	pub fn parse(s: &str) -> ClResult<Self> {
		match s {
			"system" => Ok(SettingScope::System),
			"tenant" => Ok(SettingScope::Tenant),
			"device" => Ok(SettingScope::Device),
			_ => Err(Error::InvalidScope(format!("unknown scope '{}'", s))),
		}
	}

	/// Check the scope / scope id pairing: system never has an id, every other scope must
	pub fn check_scope_id(&self, scope_id: Option<ScopeId>) -> ClResult<()> {
		match (self, scope_id) {
			(SettingScope::System, None) => Ok(()),
			(SettingScope::System, Some(id)) => Err(Error::InvalidScope(format!(
				"system scope does not take a scope id (got {})",
				id
			))),
			(scope, None) => Err(Error::InvalidScope(format!("{} scope requires a scope id", scope))),
			(_, Some(_)) => Ok(()),
		}
	}
}

impl fmt::Display for SettingScope {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Resolving context of a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeContext {
	pub tenant: Option<ScopeId>,
	pub device: Option<ScopeId>,
}

impl ScopeContext {
	/// Context without tenant or device: only system values apply
	pub fn system() -> Self {
		Self::default()
	}

	pub fn with_tenant(mut self, tenant: ScopeId) -> Self {
		self.tenant = Some(tenant);
		self
	}

	pub fn with_device(mut self, device: ScopeId) -> Self {
		self.device = Some(device);
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_scope_id_pairing() {
		assert!(SettingScope::System.check_scope_id(None).is_ok());
		assert!(SettingScope::System.check_scope_id(Some(ScopeId(1))).is_err());
		assert!(SettingScope::Tenant.check_scope_id(None).is_err());
		assert!(SettingScope::Device.check_scope_id(Some(ScopeId(42))).is_ok());
	}

	#[test]
	fn test_scope_round_trip_through_str() {
		for scope in [SettingScope::System, SettingScope::Tenant, SettingScope::Device] {
			assert_eq!(SettingScope::parse(scope.as_str()).ok(), Some(scope));
		}
		assert!(matches!(SettingScope::parse("org"), Err(Error::InvalidScope(_))));
	}

	#[test]
	fn test_sub_days() {
		assert_eq!(Timestamp(200_000).sub_days(2), Timestamp(200_000 - 172_800));
		assert_eq!(Timestamp(5).sub_days(0), Timestamp(5));
	}
}

// vim: ts=4
