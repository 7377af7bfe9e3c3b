//! Settings types and definitions
//!
//! Definitions are declared in code at startup, collected in a `SettingsRegistry`
//! and frozen into an immutable `FrozenSettingsRegistry` that is shared by reference.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;

use crate::prelude::*;
use scopecfg_types::settings_adapter::StoredDefinition;

/// Type alias for setting validator function
pub type SettingValidator = Box<dyn Fn(&SettingValue) -> ClResult<()> + Send + Sync>;

/// Setting value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)] // No type tag - type comes from the SettingDefinition
pub enum SettingValue {
	Bool(bool), // Must be before Int to avoid bool -> int coercion
	Int(i64),
	String(String),
	Json(serde_json::Value),
}

impl SettingValue {
	/// Get the type name for error messages
	pub fn type_name(&self) -> &'static str {
		match self {
			SettingValue::String(_) => "string",
			SettingValue::Int(_) => "int",
			SettingValue::Bool(_) => "bool",
			SettingValue::Json(_) => "json",
		}
	}

	/// Compact text form, used for the stored definition mirror
	pub fn to_text(&self) -> String {
		match self {
			SettingValue::String(s) => s.clone(),
			SettingValue::Int(i) => i.to_string(),
			SettingValue::Bool(b) => b.to_string(),
			SettingValue::Json(j) => j.to_string(),
		}
	}
}

/// Declared value type of a setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
	String,
	Int,
	Bool,
	/// A string restricted to a fixed set of options
	Enum(Box<[Box<str>]>),
	/// Numeric id of an object of the named kind
	Reference(Box<str>),
	Json,
}

impl ValueType {
	pub fn enumeration<I, S>(options: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<Box<str>>,
	{
		ValueType::Enum(options.into_iter().map(Into::into).collect())
	}

	pub fn name(&self) -> String {
		match self {
			ValueType::String => "string".into(),
			ValueType::Int => "int".into(),
			ValueType::Bool => "bool".into(),
			ValueType::Enum(options) => format!("enum({})", options.join("|")),
			ValueType::Reference(kind) => format!("ref({})", kind),
			ValueType::Json => "json".into(),
		}
	}

	/// Check that a value has this type
	pub fn check(&self, value: &SettingValue) -> ClResult<()> {
		let ok = match (self, value) {
			(ValueType::String, SettingValue::String(_))
			| (ValueType::Int, SettingValue::Int(_))
			| (ValueType::Bool, SettingValue::Bool(_))
			| (ValueType::Json, _) => true,
			(ValueType::Enum(options), SettingValue::String(s)) => {
				if !options.iter().any(|o| **o == *s) {
					return Err(Error::ValidationFailed(format!(
						"'{}' is not one of {}",
						s,
						options.join(", ")
					)));
				}
				true
			}
			(ValueType::Reference(kind), SettingValue::Int(id)) => {
				if *id <= 0 {
					return Err(Error::ValidationFailed(format!("invalid {} reference: {}", kind, id)));
				}
				true
			}
			_ => false,
		};

		if ok {
			Ok(())
		} else {
			Err(Error::ValidationFailed(format!(
				"type mismatch: expected {}, got {}",
				self.name(),
				value.type_name()
			)))
		}
	}

	/// Parse a raw string (as received from a transport) into a value of this type
	pub fn parse(&self, raw: &str) -> ClResult<SettingValue> {
		let value = match self {
			ValueType::String | ValueType::Enum(_) => SettingValue::String(raw.to_string()),
			ValueType::Int | ValueType::Reference(_) => {
				SettingValue::Int(raw.trim().parse().map_err(|_| {
					Error::ValidationFailed(format!("'{}' is not an integer", raw))
				})?)
			}
			ValueType::Bool => match raw.trim() {
				"true" | "1" | "yes" | "on" => SettingValue::Bool(true),
				"false" | "0" | "no" | "off" => SettingValue::Bool(false),
				_ => return Err(Error::ValidationFailed(format!("'{}' is not a boolean", raw))),
			},
			ValueType::Json => SettingValue::Json(serde_json::from_str(raw)?),
		};
		self.check(&value)?;
		Ok(value)
	}
}

/// Setting definition - defines metadata for each setting
pub struct SettingDefinition {
	/// Dot-separated key (e.g., "session.timeout_minutes")
	pub key: Box<str>,

	/// Human-readable description
	pub description: Box<str>,

	pub value_type: ValueType,

	/// Static default, used when no scope holds an override
	pub default: SettingValue,

	/// Scopes this setting may be overridden at
	pub scopes: Box<[SettingScope]>,

	/// Capability needed to see the setting
	pub read_capability: Capability,

	/// Capability needed to change the setting
	pub write_capability: Capability,

	/// Listing group (settings page tab)
	pub group: Option<Box<str>>,

	/// Optional validation function
	pub validator: Option<SettingValidator>,
}

impl Debug for SettingDefinition {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SettingDefinition")
			.field("key", &self.key)
			.field("description", &self.description)
			.field("value_type", &self.value_type)
			.field("default", &self.default)
			.field("scopes", &self.scopes)
			.field("read_capability", &self.read_capability)
			.field("write_capability", &self.write_capability)
			.field("group", &self.group)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl SettingDefinition {
	/// Create a builder for constructing a SettingDefinition
	pub fn builder(key: impl Into<Box<str>>) -> SettingDefinitionBuilder {
		SettingDefinitionBuilder::new(key)
	}

	pub fn allows_scope(&self, scope: SettingScope) -> bool {
		self.scopes.contains(&scope)
	}

	/// Check a value against the declared type and the custom validator
	pub fn validate(&self, value: &SettingValue) -> ClResult<()> {
		self.value_type.check(value)?;
		if let Some(validator) = &self.validator {
			validator(value)?;
		}
		Ok(())
	}

	pub fn to_stored(&self) -> StoredDefinition {
		StoredDefinition {
			key: self.key.clone(),
			kind: "setting".into(),
			description: self.description.clone(),
			value_type: Some(self.value_type.name().into()),
			default_value: Some(self.default.to_text().into()),
			scopes: Some(self.scopes.iter().map(SettingScope::as_str).collect::<Vec<_>>().join(",").into()),
			read_capability: self.read_capability.as_str().into(),
			write_capability: self.write_capability.as_str().into(),
			group_name: self.group.clone(),
		}
	}
}

/// Builder for SettingDefinition with fluent API
pub struct SettingDefinitionBuilder {
	key: Box<str>,
	description: Option<Box<str>>,
	value_type: Option<ValueType>,
	default: Option<SettingValue>,
	scopes: Vec<SettingScope>,
	read_capability: Capability,
	write_capability: Capability,
	group: Option<Box<str>>,
	validator: Option<SettingValidator>,
}

impl SettingDefinitionBuilder {
	pub fn new(key: impl Into<Box<str>>) -> Self {
		Self {
			key: key.into(),
			description: None,
			value_type: None,
			default: None,
			scopes: vec![SettingScope::System, SettingScope::Tenant, SettingScope::Device],
			read_capability: Capability::SettingsRead,
			write_capability: Capability::SettingsWrite,
			group: None,
			validator: None,
		}
	}

	/// Set the description (required)
	pub fn description(mut self, description: impl Into<Box<str>>) -> Self {
		self.description = Some(description.into());
		self
	}

	/// Set the value type. Inferred from the default for plain bool / int / string / json.
	pub fn value_type(mut self, value_type: ValueType) -> Self {
		self.value_type = Some(value_type);
		self
	}

	/// Set the default value (required)
	pub fn default(mut self, value: SettingValue) -> Self {
		self.default = Some(value);
		self
	}

	/// Restrict the scopes the setting can be overridden at (defaults to all)
	pub fn scopes(mut self, scopes: impl IntoIterator<Item = SettingScope>) -> Self {
		self.scopes = scopes.into_iter().collect();
		self
	}

	pub fn read_capability(mut self, cap: Capability) -> Self {
		self.read_capability = cap;
		self
	}

	pub fn write_capability(mut self, cap: Capability) -> Self {
		self.write_capability = cap;
		self
	}

	pub fn group(mut self, group: impl Into<Box<str>>) -> Self {
		self.group = Some(group.into());
		self
	}

	/// Set a validation function
	pub fn validator<F>(mut self, f: F) -> Self
	where
		F: Fn(&SettingValue) -> ClResult<()> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(f));
		self
	}

	/// Build the SettingDefinition
	pub fn build(self) -> ClResult<SettingDefinition> {
		let description = self.description.ok_or_else(|| {
			Error::ConfigError(format!("Setting '{}' needs a description", self.key))
		})?;
		let default = self
			.default
			.ok_or_else(|| Error::ConfigError(format!("Setting '{}' needs a default", self.key)))?;
		let value_type = match self.value_type {
			Some(value_type) => value_type,
			None => match default {
				SettingValue::Bool(_) => ValueType::Bool,
				SettingValue::Int(_) => ValueType::Int,
				SettingValue::String(_) => ValueType::String,
				SettingValue::Json(_) => ValueType::Json,
			},
		};

		if self.scopes.is_empty() {
			return Err(Error::ConfigError(format!("Setting '{}' has no scopes", self.key)));
		}

		let mut scopes = self.scopes;
		scopes.sort();
		scopes.dedup();

		let def = SettingDefinition {
			key: self.key,
			description,
			value_type,
			default,
			scopes: scopes.into(),
			read_capability: self.read_capability,
			write_capability: self.write_capability,
			group: self.group,
			validator: self.validator,
		};

		// The default must itself be a valid value
		def.validate(&def.default).map_err(|err| {
			Error::ConfigError(format!("Setting '{}' has an invalid default: {}", def.key, err))
		})?;

		Ok(def)
	}
}

/// Mutable registry used during app initialization
#[derive(Default)]
pub struct SettingsRegistry {
	definitions: Vec<SettingDefinition>,
	index: HashMap<Box<str>, usize>,
}

impl SettingsRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a new setting definition
	pub fn register(&mut self, def: SettingDefinition) -> ClResult<()> {
		if self.index.contains_key(&def.key) {
			return Err(Error::ConfigError(format!("Setting '{}' is already registered", def.key)));
		}

		debug!("Registering setting: {}", def.key);
		self.index.insert(def.key.clone(), self.definitions.len());
		self.definitions.push(def);
		Ok(())
	}

	/// Freeze the registry (make it immutable)
	pub fn freeze(self) -> FrozenSettingsRegistry {
		info!("Freezing settings registry with {} definitions", self.definitions.len());
		FrozenSettingsRegistry { definitions: self.definitions, index: self.index }
	}

	pub fn len(&self) -> usize {
		self.definitions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.definitions.is_empty()
	}
}

/// Immutable registry, shared by every component that looks definitions up
#[derive(Debug)]
pub struct FrozenSettingsRegistry {
	definitions: Vec<SettingDefinition>,
	index: HashMap<Box<str>, usize>,
}

impl FrozenSettingsRegistry {
	/// Get a setting definition by key
	pub fn get(&self, key: &str) -> Option<&SettingDefinition> {
		self.index.get(key).and_then(|&i| self.definitions.get(i))
	}

	/// Like `get`, failing with `DefinitionNotFound`
	pub fn lookup(&self, key: &str) -> ClResult<&SettingDefinition> {
		self.get(key).ok_or_else(|| Error::DefinitionNotFound(key.into()))
	}

	/// List all registered settings in registration order
	pub fn list(&self) -> impl Iterator<Item = &SettingDefinition> {
		self.definitions.iter()
	}

	/// List the settings of one group, in registration order
	pub fn list_by_group<'a>(
		&'a self,
		group: &'a str,
	) -> impl Iterator<Item = &'a SettingDefinition> + 'a {
		self.definitions.iter().filter(move |def| def.group.as_deref() == Some(group))
	}

	pub fn len(&self) -> usize {
		self.definitions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.definitions.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn timeout_def() -> SettingDefinition {
		SettingDefinition::builder("session_timeout_minutes")
			.description("Idle session timeout")
			.default(SettingValue::Int(30))
			.build()
			.unwrap()
	}

	#[test]
	fn test_builder_infers_type_and_defaults() {
		let def = timeout_def();
		assert_eq!(def.value_type, ValueType::Int);
		assert_eq!(&*def.scopes, &[SettingScope::System, SettingScope::Tenant, SettingScope::Device]);
		assert_eq!(def.read_capability, Capability::SettingsRead);
		assert_eq!(def.write_capability, Capability::SettingsWrite);
	}

	#[test]
	fn test_builder_requires_description_and_default() {
		let res = SettingDefinition::builder("a").default(SettingValue::Int(1)).build();
		assert!(matches!(res, Err(Error::ConfigError(_))));
		let res = SettingDefinition::builder("a").description("A").build();
		assert!(matches!(res, Err(Error::ConfigError(_))));
	}

	#[test]
	fn test_builder_rejects_invalid_default() {
		let res = SettingDefinition::builder("scan.mode")
			.description("Scan mode")
			.value_type(ValueType::enumeration(["single", "batch"]))
			.default(SettingValue::String("continuous".into()))
			.build();
		assert!(matches!(res, Err(Error::ConfigError(_))));

		let res = SettingDefinition::builder("a")
			.description("A")
			.default(SettingValue::Int(1))
			.scopes([])
			.build();
		assert!(matches!(res, Err(Error::ConfigError(_))));
	}

	#[test]
	fn test_value_type_check() {
		assert!(ValueType::Int.check(&SettingValue::Int(3)).is_ok());
		assert!(matches!(
			ValueType::Int.check(&SettingValue::String("3".into())),
			Err(Error::ValidationFailed(_))
		));
		let mode = ValueType::enumeration(["single", "batch"]);
		assert!(mode.check(&SettingValue::String("batch".into())).is_ok());
		assert!(mode.check(&SettingValue::String("other".into())).is_err());
		let location = ValueType::Reference("location".into());
		assert!(location.check(&SettingValue::Int(12)).is_ok());
		assert!(location.check(&SettingValue::Int(0)).is_err());
	}

	#[test]
	fn test_value_type_parse() {
		assert_eq!(ValueType::Int.parse("15").ok(), Some(SettingValue::Int(15)));
		assert!(ValueType::Int.parse("fifteen").is_err());
		assert_eq!(ValueType::Bool.parse("on").ok(), Some(SettingValue::Bool(true)));
		assert!(ValueType::Bool.parse("maybe").is_err());
		assert_eq!(
			ValueType::String.parse("v1").ok(),
			Some(SettingValue::String("v1".into()))
		);
		assert!(ValueType::enumeration(["a"]).parse("b").is_err());
	}

	#[test]
	fn test_untagged_value_serde() {
		let v: SettingValue = serde_json::from_value(serde_json::json!(15)).unwrap();
		assert_eq!(v, SettingValue::Int(15));
		let v: SettingValue = serde_json::from_value(serde_json::json!(true)).unwrap();
		assert_eq!(v, SettingValue::Bool(true));
		let v: SettingValue = serde_json::from_value(serde_json::json!("15")).unwrap();
		assert_eq!(v, SettingValue::String("15".into()));
	}

	#[test]
	fn test_registry_keeps_insertion_order() {
		let mut registry = SettingsRegistry::new();
		for key in ["zeta", "alpha", "mid"] {
			registry
				.register(
					SettingDefinition::builder(key)
						.description(key)
						.default(SettingValue::Bool(false))
						.group(if key == "mid" { "b" } else { "a" })
						.build()
						.unwrap(),
				)
				.unwrap();
		}
		let frozen = registry.freeze();
		let keys: Vec<&str> = frozen.list().map(|d| &*d.key).collect();
		assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
		let group_a: Vec<&str> = frozen.list_by_group("a").map(|d| &*d.key).collect();
		assert_eq!(group_a, vec!["zeta", "alpha"]);
		assert!(matches!(frozen.lookup("nope"), Err(Error::DefinitionNotFound(_))));
	}

	#[test]
	fn test_registry_rejects_duplicates() {
		let mut registry = SettingsRegistry::new();
		registry.register(timeout_def()).unwrap();
		assert!(matches!(registry.register(timeout_def()), Err(Error::ConfigError(_))));
		assert_eq!(registry.len(), 1);
	}
}

// vim: ts=4
