//! Caller capabilities
//!
//! The identity provider resolves a caller into a `CapabilitySet`. Definitions declare
//! the single capability they require, and access is a plain membership check.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
	/// Required by nothing: every caller has it implicitly
	#[serde(rename = "public")]
	Public,
	#[serde(rename = "settings.read")]
	SettingsRead,
	#[serde(rename = "settings.write")]
	SettingsWrite,
	#[serde(rename = "devices.manage")]
	DevicesManage,
	#[serde(rename = "actions.run")]
	ActionsRun,
	/// Implies every other capability
	#[serde(rename = "admin")]
	Admin,
}

impl Capability {
	pub fn as_str(&self) -> &'static str {
		match self {
			Capability::Public => "public",
			Capability::SettingsRead => "settings.read",
			Capability::SettingsWrite => "settings.write",
			Capability::DevicesManage => "devices.manage",
			Capability::ActionsRun => "actions.run",
			Capability::Admin => "admin",
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(HashSet<Capability>);

impl CapabilitySet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn contains(&self, cap: Capability) -> bool {
		self.0.contains(&cap)
	}

	pub fn insert(&mut self, cap: Capability) {
		self.0.insert(cap);
	}
}

impl FromIterator<Capability> for CapabilitySet {
	fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}

/// Does a caller holding `caps` satisfy `required`?
pub fn has_capability(caps: &CapabilitySet, required: Capability) -> bool {
	required == Capability::Public || caps.contains(Capability::Admin) || caps.contains(required)
}


// vim: ts=4
