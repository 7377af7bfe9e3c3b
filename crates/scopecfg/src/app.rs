//! App builder - wires storage, registries, services and the retention schedule together

use std::{path::Path, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

use crate::prelude::*;
use crate::retention::{self, PurgeSchedule};
use scopecfg_core::action::{ActionDefinition, ActionExecutor, ActionRegistry, FrozenActionRegistry};
use scopecfg_core::settings::{
	FrozenSettingsRegistry, SettingDefinition, SettingsOpts, SettingsRegistry, SettingsService,
};
use scopecfg_settings_adapter_sqlite::SettingsAdapterSqlite;
use scopecfg_types::settings_adapter::{SettingsAdapter, StoredDefinition};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone)]
pub struct AppBuilderOpts {
	pub db_path: Option<Box<Path>>,
	pub cache_size: usize,
	pub allow_system_delete: bool,
	pub action_timeout: Option<Duration>,
	pub purge_schedule: Option<Box<str>>,
	/// Fixed retention window for scheduled purges. `None` follows the
	/// `settings.tombstone_retention_days` setting.
	pub retention_days: Option<u32>,
}

impl Default for AppBuilderOpts {
	fn default() -> Self {
		Self {
			db_path: None,
			cache_size: 1000,
			allow_system_delete: false,
			action_timeout: None,
			purge_schedule: None,
			retention_days: None,
		}
	}
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> ClResult<T> {
	raw.trim()
		.parse()
		.map_err(|_| Error::ConfigError(format!("{} has an invalid value: '{}'", name, raw)))
}

fn parse_flag(name: &str, raw: &str) -> ClResult<bool> {
	match raw.trim() {
		"1" | "true" | "yes" | "on" => Ok(true),
		"0" | "false" | "no" | "off" | "" => Ok(false),
		_ => Err(Error::ConfigError(format!("{} has an invalid value: '{}'", name, raw))),
	}
}

impl AppBuilderOpts {
	/// Options from `SCOPECFG_*` environment variables, defaults for unset ones
	pub fn from_env() -> ClResult<Self> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ClResult<Self> {
		let mut opts = Self::default();
		if let Some(db) = lookup("SCOPECFG_DB") {
			opts.db_path = Some(Path::new(&db).into());
		}
		if let Some(raw) = lookup("SCOPECFG_CACHE_SIZE") {
			opts.cache_size = parse_var("SCOPECFG_CACHE_SIZE", &raw)?;
		}
		if let Some(raw) = lookup("SCOPECFG_RETENTION_DAYS") {
			opts.retention_days = Some(parse_var("SCOPECFG_RETENTION_DAYS", &raw)?);
		}
		if let Some(raw) = lookup("SCOPECFG_PURGE_SCHEDULE") {
			opts.purge_schedule = Some(raw.into());
		}
		if let Some(raw) = lookup("SCOPECFG_ALLOW_SYSTEM_DELETE") {
			opts.allow_system_delete = parse_flag("SCOPECFG_ALLOW_SYSTEM_DELETE", &raw)?;
		}
		if let Some(raw) = lookup("SCOPECFG_ACTION_TIMEOUT_SECS") {
			opts.action_timeout =
				Some(Duration::from_secs(parse_var("SCOPECFG_ACTION_TIMEOUT_SECS", &raw)?));
		}
		Ok(opts)
	}
}

pub struct AppState {
	pub opts: AppBuilderOpts,
	adapter: Arc<dyn SettingsAdapter>,
	pub settings: Arc<SettingsService>,
	pub settings_registry: Arc<FrozenSettingsRegistry>,
	pub actions: ActionExecutor,
	pub action_registry: Arc<FrozenActionRegistry>,
	shutdown: CancellationToken,
}

pub type App = Arc<AppState>;

impl AppState {
	/// Definitions as mirrored into storage at startup
	pub async fn stored_definitions(&self) -> ClResult<Vec<StoredDefinition>> {
		self.adapter.list_definitions().await
	}

	/// Token cancelled on shutdown. Callers can derive action cancellation tokens from it.
	pub fn shutdown_token(&self) -> &CancellationToken {
		&self.shutdown
	}

	/// Stop background tasks
	pub fn shutdown(&self) {
		info!("Shutting down");
		self.shutdown.cancel();
	}
}

pub struct AppBuilder {
	opts: AppBuilderOpts,
	adapter: Option<Arc<dyn SettingsAdapter>>,
	settings: Vec<SettingDefinition>,
	actions: Vec<ActionDefinition>,
}

impl AppBuilder {
	pub fn new() -> Self {
		// Embedders and tests may have installed a subscriber already
		let _ = tracing_subscriber::fmt()
			.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
			.with_target(false)
			.try_init();
		AppBuilder {
			opts: AppBuilderOpts::default(),
			adapter: None,
			settings: Vec::new(),
			actions: Vec::new(),
		}
	}

	// Opts
	pub fn opts(&mut self, opts: AppBuilderOpts) -> &mut Self {
		self.opts = opts;
		self
	}
	pub fn db_path(&mut self, db_path: impl AsRef<Path>) -> &mut Self {
		self.opts.db_path = Some(db_path.as_ref().into());
		self
	}
	pub fn cache_size(&mut self, cache_size: usize) -> &mut Self {
		self.opts.cache_size = cache_size;
		self
	}
	pub fn allow_system_delete(&mut self, allow: bool) -> &mut Self {
		self.opts.allow_system_delete = allow;
		self
	}
	pub fn action_timeout(&mut self, timeout: Duration) -> &mut Self {
		self.opts.action_timeout = Some(timeout);
		self
	}
	pub fn purge_schedule(&mut self, expr: impl Into<Box<str>>) -> &mut Self {
		self.opts.purge_schedule = Some(expr.into());
		self
	}
	pub fn retention_days(&mut self, days: u32) -> &mut Self {
		self.opts.retention_days = Some(days);
		self
	}

	// Adapter
	pub fn adapter(&mut self, adapter: Arc<dyn SettingsAdapter>) -> &mut Self {
		self.adapter = Some(adapter);
		self
	}

	// Definitions
	pub fn register_setting(&mut self, def: SettingDefinition) -> &mut Self {
		self.settings.push(def);
		self
	}
	pub fn register_action(&mut self, def: ActionDefinition) -> &mut Self {
		self.actions.push(def);
		self
	}

	pub async fn build(self) -> ClResult<App> {
		info!("scopecfg V{}", VERSION);

		// Validate the schedule before touching storage
		let schedule = self.opts.purge_schedule.as_deref().map(PurgeSchedule::parse).transpose()?;

		let adapter: Arc<dyn SettingsAdapter> = match self.adapter {
			Some(adapter) => adapter,
			None => {
				let Some(db_path) = &self.opts.db_path else {
					error!("FATAL: No database path configured");
					return Err(Error::ConfigError("no database path configured".into()));
				};
				Arc::new(SettingsAdapterSqlite::new(db_path).await?)
			}
		};

		let mut settings_registry = SettingsRegistry::new();
		scopecfg_core::register_settings(&mut settings_registry)?;
		for def in self.settings {
			settings_registry.register(def)?;
		}
		info!("Registered {} settings", settings_registry.len());
		let settings_registry = Arc::new(settings_registry.freeze());

		let mut action_registry = ActionRegistry::new();
		scopecfg_core::register_actions(&mut action_registry)?;
		for def in self.actions {
			action_registry.register(def)?;
		}
		let action_registry = Arc::new(action_registry.freeze());
		info!("Registered {} actions", action_registry.len());

		let settings = Arc::new(SettingsService::new(
			settings_registry.clone(),
			adapter.clone(),
			&SettingsOpts {
				cache_size: self.opts.cache_size,
				allow_system_delete: self.opts.allow_system_delete,
			},
		));
		let actions =
			ActionExecutor::new(action_registry.clone(), settings.clone(), self.opts.action_timeout);

		scopecfg_core::sync::sync_to_storage(adapter.as_ref(), &settings_registry, &action_registry)
			.await?;

		let shutdown = CancellationToken::new();
		if let Some(schedule) = schedule {
			retention::spawn_purge_task(
				settings.clone(),
				schedule,
				self.opts.retention_days,
				shutdown.clone(),
			);
		}

		Ok(Arc::new(AppState {
			opts: self.opts,
			adapter,
			settings,
			settings_registry,
			actions,
			action_registry,
			shutdown,
		}))
	}
}

impl Default for AppBuilder {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let vars: HashMap<String, String> =
			vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
		move |name| vars.get(name).cloned()
	}

	#[test]
	fn test_opts_defaults() {
		let opts = AppBuilderOpts::from_lookup(lookup(&[])).unwrap();
		assert!(opts.db_path.is_none());
		assert_eq!(opts.cache_size, 1000);
		assert!(!opts.allow_system_delete);
		assert!(opts.retention_days.is_none());
		assert!(opts.purge_schedule.is_none());
	}

	#[test]
	fn test_opts_from_vars() {
		let opts = AppBuilderOpts::from_lookup(lookup(&[
			("SCOPECFG_DB", "/var/lib/scopecfg/settings.db"),
			("SCOPECFG_CACHE_SIZE", "0"),
			("SCOPECFG_RETENTION_DAYS", "7"),
			("SCOPECFG_PURGE_SCHEDULE", "0 3 * * *"),
			("SCOPECFG_ALLOW_SYSTEM_DELETE", "yes"),
			("SCOPECFG_ACTION_TIMEOUT_SECS", "30"),
		]))
		.unwrap();
		assert_eq!(opts.db_path.as_deref(), Some(Path::new("/var/lib/scopecfg/settings.db")));
		assert_eq!(opts.cache_size, 0);
		assert_eq!(opts.retention_days, Some(7));
		assert_eq!(opts.purge_schedule.as_deref(), Some("0 3 * * *"));
		assert!(opts.allow_system_delete);
		assert_eq!(opts.action_timeout, Some(Duration::from_secs(30)));
	}

	#[test]
	fn test_opts_invalid_values() {
		let res = AppBuilderOpts::from_lookup(lookup(&[("SCOPECFG_RETENTION_DAYS", "-1")]));
		assert!(matches!(res, Err(Error::ConfigError(_))));
		let res = AppBuilderOpts::from_lookup(lookup(&[("SCOPECFG_ALLOW_SYSTEM_DELETE", "maybe")]));
		assert!(matches!(res, Err(Error::ConfigError(_))));
	}
}

// vim: ts=4
