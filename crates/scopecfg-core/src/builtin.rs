//! Built-in settings and actions
//!
//! Deployments register their own catalog on top of these through the app builder.

use async_trait::async_trait;

use crate::action::{ActionContext, ActionDefinition, ActionHandler, ActionRegistry, ActionResult};
use crate::prelude::*;
use crate::settings::validators::int_range;
use crate::settings::{SettingDefinition, SettingValue, SettingsRegistry, ValueType};

pub const SESSION_TIMEOUT_MINUTES: &str = "session_timeout_minutes";
pub const TOMBSTONE_RETENTION_DAYS: &str = "settings.tombstone_retention_days";

/// Register all built-in settings
pub fn register_settings(registry: &mut SettingsRegistry) -> ClResult<()> {
	registry.register(
		SettingDefinition::builder(SESSION_TIMEOUT_MINUTES)
			.description("Minutes of inactivity before a session expires")
			.default(SettingValue::Int(30))
			.validator(int_range(1, 24 * 60))
			.group("session")
			.build()?,
	)?;

	registry.register(
		SettingDefinition::builder("device.scan_mode")
			.description("How a reader reports scanned tags")
			.value_type(ValueType::enumeration(["single", "continuous", "batch"]))
			.default(SettingValue::String("single".into()))
			.scopes([SettingScope::System, SettingScope::Tenant, SettingScope::Device])
			.write_capability(Capability::DevicesManage)
			.group("device")
			.build()?,
	)?;

	registry.register(
		SettingDefinition::builder("device.beep_on_scan")
			.description("Play a sound when a tag is read")
			.default(SettingValue::Bool(true))
			.write_capability(Capability::DevicesManage)
			.group("device")
			.build()?,
	)?;

	registry.register(
		SettingDefinition::builder("ui.theme")
			.description("Color theme of the management interface")
			.value_type(ValueType::enumeration(["light", "dark", "system"]))
			.default(SettingValue::String("system".into()))
			.scopes([SettingScope::System, SettingScope::Tenant])
			.read_capability(Capability::Public)
			.group("ui")
			.build()?,
	)?;

	// Instance-wide only, so never resolved with a tenant or device
	registry.register(
		SettingDefinition::builder(TOMBSTONE_RETENTION_DAYS)
			.description("Days a deleted override can still be restored before it is purged")
			.default(SettingValue::Int(30))
			.validator(int_range(0, 3650))
			.scopes([SettingScope::System])
			.write_capability(Capability::Admin)
			.group("maintenance")
			.build()?,
	)?;

	Ok(())
}

/// Purge tombstones past the configured retention window
#[derive(Debug)]
struct PurgeDeletedAction;

#[async_trait]
impl ActionHandler for PurgeDeletedAction {
	async fn run(&self, ctx: ActionContext<'_>) -> ClResult<ActionResult> {
		let days = ctx.settings.get_int(TOMBSTONE_RETENTION_DAYS, &ScopeContext::system()).await?;
		let count = ctx.settings.purge_older_than(days).await?;
		Ok(ActionResult::ok(format!("purged {} overrides deleted more than {} days ago", count, days)))
	}
}

#[derive(Debug)]
struct ClearCacheAction;

#[async_trait]
impl ActionHandler for ClearCacheAction {
	async fn run(&self, ctx: ActionContext<'_>) -> ClResult<ActionResult> {
		ctx.settings.clear_cache();
		Ok(ActionResult::ok("settings cache cleared"))
	}
}

/// Register all built-in actions
pub fn register_actions(registry: &mut ActionRegistry) -> ClResult<()> {
	registry.register(
		ActionDefinition::new(
			"settings.purge_deleted",
			"Permanently remove deleted overrides past the retention window",
			PurgeDeletedAction,
		)
		.capability(Capability::Admin),
	)?;

	registry.register(ActionDefinition::new(
		"settings.clear_cache",
		"Drop all cached setting resolutions",
		ClearCacheAction,
	))?;

	Ok(())
}

// vim: ts=4
