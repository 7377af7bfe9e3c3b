//! Action definitions and registry

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::prelude::*;
use crate::settings::SettingsService;
use scopecfg_types::settings_adapter::StoredDefinition;

/// What a handler reports back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
	pub success: bool,
	pub message: String,
}

impl ActionResult {
	pub fn ok(message: impl Into<String>) -> Self {
		Self { success: true, message: message.into() }
	}

	pub fn failed(message: impl Into<String>) -> Self {
		Self { success: false, message: message.into() }
	}
}

/// Everything a handler may use while it runs
pub struct ActionContext<'a> {
	pub audit: &'a AuditContext,
	pub settings: &'a SettingsService,
	/// Cancelled when the caller gives up or the time limit expires
	pub cancel: CancellationToken,
}

#[async_trait]
pub trait ActionHandler: Send + Sync {
	/// Run the action. `Ok` with `success: false` and `Err` both count as a failed execution.
	async fn run(&self, ctx: ActionContext<'_>) -> ClResult<ActionResult>;
}

pub struct ActionDefinition {
	pub key: Box<str>,
	pub description: Box<str>,
	/// Capability needed to run the action
	pub capability: Capability,
	pub handler: Arc<dyn ActionHandler>,
}

impl Debug for ActionDefinition {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ActionDefinition")
			.field("key", &self.key)
			.field("description", &self.description)
			.field("capability", &self.capability)
			.finish_non_exhaustive()
	}
}

impl ActionDefinition {
	pub fn new(
		key: impl Into<Box<str>>,
		description: impl Into<Box<str>>,
		handler: impl ActionHandler + 'static,
	) -> Self {
		Self {
			key: key.into(),
			description: description.into(),
			capability: Capability::ActionsRun,
			handler: Arc::new(handler),
		}
	}

	pub fn capability(mut self, capability: Capability) -> Self {
		self.capability = capability;
		self
	}

	pub fn to_stored(&self) -> StoredDefinition {
		StoredDefinition {
			key: self.key.clone(),
			kind: "action".into(),
			description: self.description.clone(),
			value_type: None,
			default_value: None,
			scopes: None,
			read_capability: self.capability.as_str().into(),
			write_capability: self.capability.as_str().into(),
			group_name: None,
		}
	}
}

/// Mutable registry used during app initialization
#[derive(Default)]
pub struct ActionRegistry {
	definitions: Vec<ActionDefinition>,
	index: HashMap<Box<str>, usize>,
}

impl ActionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, def: ActionDefinition) -> ClResult<()> {
		if self.index.contains_key(&def.key) {
			return Err(Error::ConfigError(format!("Action '{}' is already registered", def.key)));
		}

		debug!("Registering action: {}", def.key);
		self.index.insert(def.key.clone(), self.definitions.len());
		self.definitions.push(def);
		Ok(())
	}

	pub fn freeze(self) -> FrozenActionRegistry {
		info!("Freezing action registry with {} definitions", self.definitions.len());
		FrozenActionRegistry { definitions: self.definitions, index: self.index }
	}
}

#[derive(Debug)]
pub struct FrozenActionRegistry {
	definitions: Vec<ActionDefinition>,
	index: HashMap<Box<str>, usize>,
}

impl FrozenActionRegistry {
	pub fn get(&self, key: &str) -> Option<&ActionDefinition> {
		self.index.get(key).and_then(|&i| self.definitions.get(i))
	}

	pub fn lookup(&self, key: &str) -> ClResult<&ActionDefinition> {
		self.get(key).ok_or_else(|| Error::ActionNotFound(key.into()))
	}

	/// List all registered actions in registration order
	pub fn list(&self) -> impl Iterator<Item = &ActionDefinition> {
		self.definitions.iter()
	}

	pub fn len(&self) -> usize {
		self.definitions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.definitions.is_empty()
	}
}

// vim: ts=4
