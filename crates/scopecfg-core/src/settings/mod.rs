//! Settings subsystem types and service

pub mod cache;
pub mod service;
pub mod types;
pub mod validators;

pub use service::{ResolvedSetting, SettingsOpts, SettingsService, ValueSource};
pub use types::{
	FrozenSettingsRegistry, SettingDefinition, SettingDefinitionBuilder, SettingValue,
	SettingsRegistry, ValueType,
};

// vim: ts=4
