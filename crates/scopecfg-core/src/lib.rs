//! Core of the scopecfg settings engine.
//!
//! The definition registries are built once at startup, frozen, and handed to the
//! services that need them. `SettingsService` resolves effective values across the
//! device / tenant / system hierarchy and performs audited mutations through a
//! `SettingsAdapter`. `ActionExecutor` runs registered named actions and records
//! their outcome.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod action;
pub mod builtin;
pub mod prelude;
pub mod settings;
pub mod sync;

pub use action::{ActionDefinition, ActionExecutor, ActionHandler, ActionRegistry, ActionResult};
pub use settings::{
	FrozenSettingsRegistry, ResolvedSetting, SettingDefinition, SettingValue, SettingsRegistry,
	SettingsService, ValueSource, ValueType,
};

pub fn register_settings(registry: &mut settings::SettingsRegistry) -> scopecfg_types::error::ClResult<()> {
	builtin::register_settings(registry)
}

pub fn register_actions(registry: &mut action::ActionRegistry) -> scopecfg_types::error::ClResult<()> {
	builtin::register_actions(registry)
}

// vim: ts=4
