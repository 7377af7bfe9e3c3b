//! Shared test environment: SQLite adapter in a temp dir plus the core services

#![allow(dead_code)]

use scopecfg_core::action::{ActionExecutor, ActionRegistry, FrozenActionRegistry};
use scopecfg_core::settings::{
	FrozenSettingsRegistry, SettingDefinition, SettingValue, SettingsOpts, SettingsRegistry,
	SettingsService,
};
use scopecfg_settings_adapter_sqlite::SettingsAdapterSqlite;
use scopecfg_types::audit::AuditContext;
use scopecfg_types::capability::Capability;
use scopecfg_types::settings_adapter::SettingsAdapter;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub struct TestEnv {
	pub settings: Arc<SettingsService>,
	pub actions: ActionExecutor,
	pub adapter: Arc<dyn SettingsAdapter>,
	pub settings_registry: Arc<FrozenSettingsRegistry>,
	pub action_registry: Arc<FrozenActionRegistry>,
	_temp: TempDir,
}

pub async fn setup_with<F>(opts: SettingsOpts, timeout: Option<Duration>, extra: F) -> TestEnv
where
	F: FnOnce(&mut SettingsRegistry, &mut ActionRegistry),
{
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();

	let temp_dir = TempDir::new().expect("Failed to create temp directory");
	let adapter: Arc<dyn SettingsAdapter> = Arc::new(
		SettingsAdapterSqlite::new(temp_dir.path().join("settings.db"))
			.await
			.expect("Failed to create adapter"),
	);

	let mut settings_registry = SettingsRegistry::new();
	let mut action_registry = ActionRegistry::new();
	scopecfg_core::register_settings(&mut settings_registry).expect("builtin settings");
	scopecfg_core::register_actions(&mut action_registry).expect("builtin actions");
	settings_registry
		.register(
			SettingDefinition::builder("greeting")
				.description("Text shown on the reader display")
				.default(SettingValue::String("hello".into()))
				.build()
				.expect("greeting definition"),
		)
		.expect("register greeting");
	extra(&mut settings_registry, &mut action_registry);

	let settings_registry = Arc::new(settings_registry.freeze());
	let action_registry = Arc::new(action_registry.freeze());
	let settings =
		Arc::new(SettingsService::new(settings_registry.clone(), adapter.clone(), &opts));
	let actions = ActionExecutor::new(action_registry.clone(), settings.clone(), timeout);

	TestEnv { settings, actions, adapter, settings_registry, action_registry, _temp: temp_dir }
}

pub async fn setup() -> TestEnv {
	setup_with(SettingsOpts::default(), None, |_, _| {}).await
}

pub fn admin() -> AuditContext {
	AuditContext::new("u-admin", "Admin")
		.with_origin(Some("192.0.2.10"), Some("test-agent"))
		.with_capabilities([Capability::Admin])
}

pub fn writer() -> AuditContext {
	AuditContext::new("u-writer", "Writer")
		.with_capabilities([Capability::SettingsRead, Capability::SettingsWrite, Capability::ActionsRun])
}

pub fn reader() -> AuditContext {
	AuditContext::new("u-reader", "Reader").with_capabilities([Capability::SettingsRead])
}

/// May run actions but not change settings
pub fn runner() -> AuditContext {
	AuditContext::new("u-runner", "Runner").with_capabilities([Capability::ActionsRun])
}
