//! Scope resolution and audited mutation tests

mod common;

use async_trait::async_trait;
use common::{admin, reader, setup, setup_with, writer};
use scopecfg_core::settings::{SettingValue, SettingsOpts, SettingsService, ValueSource};
use scopecfg_types::audit::{AuditContext, AuditEntry, AuditKind};
use scopecfg_types::capability::{Capability, CapabilitySet};
use scopecfg_types::error::{ClResult, Error};
use scopecfg_types::settings_adapter::{
	ActionExecutionRecord, OverrideTarget, SettingOverride, SettingsAdapter, StoredDefinition,
};
use scopecfg_types::types::{ScopeContext, ScopeId, SettingScope, Timestamp};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const KEY: &str = "session_timeout_minutes";

fn device_ctx(id: i64) -> ScopeContext {
	ScopeContext::system().with_device(ScopeId(id))
}

#[tokio::test]
async fn test_defaults_without_overrides() {
	let env = setup().await;
	let ctx = ScopeContext::system().with_tenant(ScopeId(1)).with_device(ScopeId(2));

	for def in env.settings_registry.list() {
		let resolved = env.settings.resolve(&def.key, &ctx).await.unwrap();
		assert_eq!(resolved.value, def.default, "default of {}", def.key);
		assert_eq!(resolved.source, ValueSource::Default);
	}
}

#[tokio::test]
async fn test_session_timeout_scenario() {
	let env = setup().await;
	let ctx = device_ctx(42);

	// (1) static default
	let r = env.settings.resolve(KEY, &ScopeContext::system()).await.unwrap();
	assert_eq!((r.value, r.source), (SettingValue::Int(30), ValueSource::Default));

	// (2) device override
	env.settings.set_raw(KEY, "15", SettingScope::Device, Some(ScopeId(42)), &admin()).await.unwrap();
	let r = env.settings.resolve(KEY, &ctx).await.unwrap();
	assert_eq!((r.value, r.source), (SettingValue::Int(15), ValueSource::Device));

	// (3) soft delete falls back to the default
	env.settings.soft_delete(KEY, SettingScope::Device, Some(ScopeId(42)), &admin()).await.unwrap();
	let r = env.settings.resolve(KEY, &ctx).await.unwrap();
	assert_eq!((r.value, r.source), (SettingValue::Int(30), ValueSource::Default));

	// (4) restore brings the device value back
	env.settings.restore(KEY, SettingScope::Device, Some(ScopeId(42)), &admin()).await.unwrap();
	let r = env.settings.resolve(KEY, &ctx).await.unwrap();
	assert_eq!((r.value, r.source), (SettingValue::Int(15), ValueSource::Device));
}

#[tokio::test]
async fn test_device_beats_tenant() {
	let env = setup().await;
	env.settings
		.set(KEY, SettingValue::Int(45), SettingScope::Tenant, Some(ScopeId(3)), &admin())
		.await
		.unwrap();
	env.settings
		.set(KEY, SettingValue::Int(5), SettingScope::Device, Some(ScopeId(42)), &admin())
		.await
		.unwrap();

	let ctx = ScopeContext::system().with_tenant(ScopeId(3)).with_device(ScopeId(42));
	let r = env.settings.resolve(KEY, &ctx).await.unwrap();
	assert_eq!((r.value, r.source), (SettingValue::Int(5), ValueSource::Device));

	// Another device of the same tenant gets the tenant value
	let ctx = ScopeContext::system().with_tenant(ScopeId(3)).with_device(ScopeId(43));
	let r = env.settings.resolve(KEY, &ctx).await.unwrap();
	assert_eq!((r.value, r.source), (SettingValue::Int(45), ValueSource::Tenant));

	// Without a tenant in the context the tenant override does not apply
	let r = env.settings.resolve(KEY, &device_ctx(43)).await.unwrap();
	assert_eq!(r.source, ValueSource::Default);
}

#[tokio::test]
async fn test_precedence_for_all_combinations() {
	for mask in 0u8..8 {
		let env = setup().await;
		let (device, tenant, system) = (mask & 1 != 0, mask & 2 != 0, mask & 4 != 0);
		if device {
			env.settings
				.set(KEY, SettingValue::Int(1), SettingScope::Device, Some(ScopeId(9)), &admin())
				.await
				.unwrap();
		}
		if tenant {
			env.settings
				.set(KEY, SettingValue::Int(2), SettingScope::Tenant, Some(ScopeId(8)), &admin())
				.await
				.unwrap();
		}
		if system {
			env.settings.set(KEY, SettingValue::Int(3), SettingScope::System, None, &admin()).await.unwrap();
		}

		let ctx = ScopeContext::system().with_tenant(ScopeId(8)).with_device(ScopeId(9));
		let r = env.settings.resolve(KEY, &ctx).await.unwrap();
		let expected = if device {
			(SettingValue::Int(1), ValueSource::Device)
		} else if tenant {
			(SettingValue::Int(2), ValueSource::Tenant)
		} else if system {
			(SettingValue::Int(3), ValueSource::System)
		} else {
			(SettingValue::Int(30), ValueSource::Default)
		};
		assert_eq!((r.value, r.source), expected, "mask {:03b}", mask);
	}
}

#[tokio::test]
async fn test_round_trip_falls_through_to_broader_scope() {
	let env = setup().await;
	env.settings.set_raw("greeting", "tenant hi", SettingScope::Tenant, Some(ScopeId(1)), &writer()).await.unwrap();
	env.settings.set_raw("greeting", "v1", SettingScope::Device, Some(ScopeId(42)), &writer()).await.unwrap();
	let ctx = ScopeContext::system().with_tenant(ScopeId(1)).with_device(ScopeId(42));

	assert_eq!(env.settings.get_string("greeting", &ctx).await.unwrap(), "v1");
	env.settings.soft_delete("greeting", SettingScope::Device, Some(ScopeId(42)), &writer()).await.unwrap();
	let r = env.settings.resolve("greeting", &ctx).await.unwrap();
	assert_eq!((r.value, r.source), (SettingValue::String("tenant hi".into()), ValueSource::Tenant));
	env.settings.restore("greeting", SettingScope::Device, Some(ScopeId(42)), &writer()).await.unwrap();
	assert_eq!(env.settings.get_string("greeting", &ctx).await.unwrap(), "v1");
}

#[tokio::test]
async fn test_invalid_scope_and_validation() {
	let env = setup().await;

	let res = env.settings.set(KEY, SettingValue::Int(10), SettingScope::System, Some(ScopeId(1)), &admin()).await;
	assert!(matches!(res, Err(Error::InvalidScope(_))));
	let res = env.settings.set(KEY, SettingValue::Int(10), SettingScope::Device, None, &admin()).await;
	assert!(matches!(res, Err(Error::InvalidScope(_))));
	// ui.theme cannot be set per device
	let res = env.settings
		.set("ui.theme", SettingValue::String("dark".into()), SettingScope::Device, Some(ScopeId(1)), &admin())
		.await;
	assert!(matches!(res, Err(Error::InvalidScope(_))));

	let res = env.settings.set(KEY, SettingValue::Int(0), SettingScope::System, None, &admin()).await;
	assert!(matches!(res, Err(Error::ValidationFailed(_))));
	let res = env.settings.set(KEY, SettingValue::Bool(true), SettingScope::System, None, &admin()).await;
	assert!(matches!(res, Err(Error::ValidationFailed(_))));
	let res = env.settings.set_raw(KEY, "soon", SettingScope::System, None, &admin()).await;
	assert!(matches!(res, Err(Error::ValidationFailed(_))));

	let res = env.settings.set("nope", SettingValue::Int(1), SettingScope::System, None, &admin()).await;
	assert!(matches!(res, Err(Error::DefinitionNotFound(_))));
	let res = env.settings.resolve("nope", &ScopeContext::system()).await;
	assert!(matches!(res, Err(Error::DefinitionNotFound(_))));

	// Nothing above was written or audited
	assert!(env.settings.recent_changes(100).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_permission_checks() {
	let env = setup().await;

	let res = env.settings.set(KEY, SettingValue::Int(10), SettingScope::System, None, &reader()).await;
	assert!(matches!(res, Err(Error::PermissionDenied)));

	// device.* settings need devices.manage, which a plain writer lacks
	let res = env.settings
		.set("device.beep_on_scan", SettingValue::Bool(false), SettingScope::Device, Some(ScopeId(1)), &writer())
		.await;
	assert!(matches!(res, Err(Error::PermissionDenied)));

	env.settings.set(KEY, SettingValue::Int(10), SettingScope::Device, Some(ScopeId(1)), &writer()).await.unwrap();
	let res = env.settings.soft_delete(KEY, SettingScope::Device, Some(ScopeId(1)), &reader()).await;
	assert!(matches!(res, Err(Error::PermissionDenied)));
}

#[tokio::test]
async fn test_system_delete_policy() {
	let env = setup().await;
	env.settings.set(KEY, SettingValue::Int(60), SettingScope::System, None, &admin()).await.unwrap();
	let res = env.settings.soft_delete(KEY, SettingScope::System, None, &admin()).await;
	assert!(matches!(res, Err(Error::InvalidScope(_))));
	assert_eq!(env.settings.get_int(KEY, &ScopeContext::system()).await.unwrap(), 60);

	let opts = SettingsOpts { allow_system_delete: true, ..SettingsOpts::default() };
	let env = setup_with(opts, None, |_, _| {}).await;
	env.settings.set(KEY, SettingValue::Int(60), SettingScope::System, None, &admin()).await.unwrap();
	env.settings.soft_delete(KEY, SettingScope::System, None, &admin()).await.unwrap();
	let r = env.settings.resolve(KEY, &ScopeContext::system()).await.unwrap();
	assert_eq!(r.source, ValueSource::Default);
}

#[tokio::test]
async fn test_missing_delete_and_restore_targets() {
	let env = setup().await;
	let res = env.settings.soft_delete(KEY, SettingScope::Device, Some(ScopeId(5)), &admin()).await;
	assert!(matches!(res, Err(Error::OverrideNotFound)));
	let res = env.settings.restore(KEY, SettingScope::Device, Some(ScopeId(5)), &admin()).await;
	assert!(matches!(res, Err(Error::OverrideNotFound)));
}

#[tokio::test]
async fn test_one_audit_entry_per_mutation() {
	let env = setup().await;
	let target = (SettingScope::Device, Some(ScopeId(42)));

	env.settings.set(KEY, SettingValue::Int(15), target.0, target.1, &admin()).await.unwrap();
	env.settings.set(KEY, SettingValue::Int(20), target.0, target.1, &admin()).await.unwrap();
	env.settings.soft_delete(KEY, target.0, target.1, &admin()).await.unwrap();
	env.settings.restore(KEY, target.0, target.1, &admin()).await.unwrap();

	let history = env.settings.history(KEY, 10).await.unwrap();
	let summary: Vec<_> = history
		.iter()
		.map(|e| (e.kind, e.old_value.clone(), e.new_value.clone()))
		.collect();
	assert_eq!(
		summary,
		vec![
			(AuditKind::Restore, None, Some(json!(20))),
			(AuditKind::Delete, Some(json!(20)), None),
			(AuditKind::Set, Some(json!(15)), Some(json!(20))),
			(AuditKind::Set, None, Some(json!(15))),
		]
	);
	let entry = &history[0];
	assert_eq!(entry.scope, SettingScope::Device);
	assert_eq!(entry.scope_id, Some(ScopeId(42)));
	assert_eq!(entry.actor_id.as_deref(), Some("u-admin"));
	assert_eq!(entry.remote_addr.as_deref(), Some("192.0.2.10"));
	assert_eq!(entry.user_agent.as_deref(), Some("test-agent"));

	assert_eq!(env.settings.history(KEY, 2).await.unwrap().len(), 2);
	assert!(env.settings.history(KEY, 0).await.unwrap().is_empty());
	assert!(matches!(env.settings.history("nope", 10).await, Err(Error::DefinitionNotFound(_))));
}

#[tokio::test]
async fn test_purge_older_than() {
	let env = setup().await;
	for id in 1..=3 {
		env.settings.set(KEY, SettingValue::Int(10), SettingScope::Device, Some(ScopeId(id)), &admin()).await.unwrap();
	}
	env.settings.soft_delete(KEY, SettingScope::Device, Some(ScopeId(1)), &admin()).await.unwrap();
	env.settings.soft_delete(KEY, SettingScope::Device, Some(ScopeId(2)), &admin()).await.unwrap();

	// Deleted just now: not older than a day
	assert_eq!(env.settings.purge_older_than(1).await.unwrap(), 0);
	// Zero days purges every tombstone
	assert_eq!(env.settings.purge_older_than(0).await.unwrap(), 2);
	assert_eq!(env.settings.purge_older_than(0).await.unwrap(), 0);

	let rows = env.settings.list_overrides(KEY, true).await.unwrap();
	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0].scope_id, Some(ScopeId(3)));

	let res = env.settings.restore(KEY, SettingScope::Device, Some(ScopeId(1)), &admin()).await;
	assert!(matches!(res, Err(Error::OverrideNotFound)));
	assert!(matches!(env.settings.purge_older_than(-1).await, Err(Error::ValidationFailed(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sets_serialize() {
	let env = setup().await;

	let mut handles = Vec::new();
	for value in ["10", "20"] {
		let settings = env.settings.clone();
		handles.push(tokio::spawn(async move {
			settings.set_raw(KEY, value, SettingScope::Device, Some(ScopeId(7)), &admin()).await
		}));
	}
	for handle in handles {
		handle.await.unwrap().unwrap();
	}

	let final_value = env.settings.get_int(KEY, &device_ctx(7)).await.unwrap();
	assert!(final_value == 10 || final_value == 20);

	let history = env.settings.history(KEY, 10).await.unwrap();
	assert_eq!(history.len(), 2);
	assert_ne!(history[0].audit_id, history[1].audit_id);
	assert_eq!(history[0].new_value, Some(json!(final_value)));
	assert_eq!(history[0].old_value, history[1].new_value);
	assert_eq!(env.settings.list_overrides(KEY, true).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cache_is_invalidated_by_mutations() {
	let env = setup().await;
	let ctx = device_ctx(42);

	assert_eq!(env.settings.get_int(KEY, &ctx).await.unwrap(), 30);
	env.settings.set(KEY, SettingValue::Int(12), SettingScope::Device, Some(ScopeId(42)), &admin()).await.unwrap();
	assert_eq!(env.settings.get_int(KEY, &ctx).await.unwrap(), 12);
	env.settings.set(KEY, SettingValue::Int(13), SettingScope::System, None, &admin()).await.unwrap();
	assert_eq!(env.settings.get_int(KEY, &ScopeContext::system()).await.unwrap(), 13);
	env.settings.soft_delete(KEY, SettingScope::Device, Some(ScopeId(42)), &admin()).await.unwrap();
	let r = env.settings.resolve(KEY, &ctx).await.unwrap();
	assert_eq!((r.value, r.source), (SettingValue::Int(13), ValueSource::System));
}

#[tokio::test]
async fn test_list_definitions_is_capability_filtered() {
	let env = setup().await;

	let anonymous = CapabilitySet::new();
	let keys: Vec<&str> = env.settings.list_definitions(&anonymous).map(|d| &*d.key).collect();
	assert_eq!(keys, vec!["ui.theme"]);

	let caps: CapabilitySet = [Capability::SettingsRead].into_iter().collect();
	let keys: Vec<&str> = env.settings.list_definitions(&caps).map(|d| &*d.key).collect();
	assert_eq!(keys.len(), env.settings_registry.len());
	assert_eq!(keys[0], KEY, "registration order is kept");
}

#[tokio::test]
async fn test_sync_to_storage_is_idempotent() {
	let env = setup().await;

	let count = scopecfg_core::sync::sync_to_storage(
		env.adapter.as_ref(),
		&env.settings_registry,
		&env.action_registry,
	)
	.await
	.unwrap();
	let first = env.adapter.list_definitions().await.unwrap();
	scopecfg_core::sync::sync_to_storage(env.adapter.as_ref(), &env.settings_registry, &env.action_registry)
		.await
		.unwrap();
	let second = env.adapter.list_definitions().await.unwrap();

	assert_eq!(first, second);
	assert_eq!(first.len(), count);
	let timeout = first.iter().find(|d| &*d.key == KEY).unwrap();
	assert_eq!(timeout.value_type.as_deref(), Some("int"));
	assert_eq!(timeout.default_value.as_deref(), Some("30"));
	assert_eq!(timeout.scopes.as_deref(), Some("system,tenant,device"));
	assert!(first.iter().any(|d| &*d.kind == "action" && &*d.key == "settings.purge_deleted"));
}

#[tokio::test]
async fn test_delete_and_restore_check_allowed_scopes() {
	let env = setup().await;
	// ui.theme cannot be overridden per device, so there is nothing to delete or restore there
	let res = env.settings.soft_delete("ui.theme", SettingScope::Device, Some(ScopeId(1)), &admin()).await;
	assert!(matches!(res, Err(Error::InvalidScope(_))));
	let res = env.settings.restore("ui.theme", SettingScope::Device, Some(ScopeId(1)), &admin()).await;
	assert!(matches!(res, Err(Error::InvalidScope(_))));
	let res = env.settings.restore(KEY, SettingScope::Tenant, None, &admin()).await;
	assert!(matches!(res, Err(Error::InvalidScope(_))));
}

/// Storage whose override writes are slow on both sides of the commit
#[derive(Debug)]
struct SlowWrites {
	inner: Arc<dyn SettingsAdapter>,
	before_commit: Duration,
	after_commit: Duration,
}

#[async_trait]
impl SettingsAdapter for SlowWrites {
	async fn read_override(&self, target: OverrideTarget<'_>) -> ClResult<Option<SettingOverride>> {
		self.inner.read_override(target).await
	}

	async fn list_overrides(&self, key: &str, include_deleted: bool) -> ClResult<Vec<SettingOverride>> {
		self.inner.list_overrides(key, include_deleted).await
	}

	async fn write_override(
		&self,
		target: OverrideTarget<'_>,
		value: &serde_json::Value,
		ctx: &AuditContext,
		now: Timestamp,
	) -> ClResult<Option<serde_json::Value>> {
		tokio::time::sleep(self.before_commit).await;
		let old = self.inner.write_override(target, value, ctx, now).await?;
		tokio::time::sleep(self.after_commit).await;
		Ok(old)
	}

	async fn soft_delete_override(
		&self,
		target: OverrideTarget<'_>,
		ctx: &AuditContext,
		now: Timestamp,
	) -> ClResult<serde_json::Value> {
		self.inner.soft_delete_override(target, ctx, now).await
	}

	async fn restore_override(
		&self,
		target: OverrideTarget<'_>,
		ctx: &AuditContext,
		now: Timestamp,
	) -> ClResult<serde_json::Value> {
		self.inner.restore_override(target, ctx, now).await
	}

	async fn purge_deleted(&self, cutoff: Timestamp) -> ClResult<u64> {
		self.inner.purge_deleted(cutoff).await
	}

	async fn list_audit(&self, key: Option<&str>, limit: u32) -> ClResult<Vec<AuditEntry>> {
		self.inner.list_audit(key, limit).await
	}

	async fn sync_definitions(&self, defs: &[StoredDefinition]) -> ClResult<()> {
		self.inner.sync_definitions(defs).await
	}

	async fn list_definitions(&self) -> ClResult<Vec<StoredDefinition>> {
		self.inner.list_definitions().await
	}

	async fn create_action_execution(
		&self,
		key: &str,
		success: bool,
		message: &str,
		ctx: &AuditContext,
		now: Timestamp,
	) -> ClResult<u64> {
		self.inner.create_action_execution(key, success, message, ctx, now).await
	}

	async fn list_action_executions(
		&self,
		key: Option<&str>,
		limit: u32,
	) -> ClResult<Vec<ActionExecutionRecord>> {
		self.inner.list_action_executions(key, limit).await
	}
}

#[tokio::test]
async fn test_abandoned_set_still_invalidates_cache() {
	let env = setup().await;
	let slow: Arc<dyn SettingsAdapter> = Arc::new(SlowWrites {
		inner: env.adapter.clone(),
		before_commit: Duration::from_millis(100),
		after_commit: Duration::from_millis(300),
	});
	let settings = SettingsService::new(env.settings_registry.clone(), slow, &SettingsOpts::default());
	let ctx = device_ctx(42);
	let actor = admin();

	// The caller gives up after the commit, while a reader caches the pre-commit value
	let (set_res, before) = tokio::join!(
		tokio::time::timeout(
			Duration::from_millis(200),
			settings.set(KEY, SettingValue::Int(15), SettingScope::Device, Some(ScopeId(42)), &actor),
		),
		async {
			tokio::time::sleep(Duration::from_millis(20)).await;
			settings.resolve(KEY, &ctx).await
		},
	);
	assert!(set_res.is_err(), "set should have been abandoned");
	assert_eq!(before.unwrap().value, SettingValue::Int(30));

	// The write committed, with its audit entry
	let rows = settings.list_overrides(KEY, false).await.unwrap();
	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0].value, json!(15));
	assert_eq!(settings.history(KEY, 10).await.unwrap().len(), 1);

	let r = settings.resolve(KEY, &ctx).await.unwrap();
	assert_eq!((r.value, r.source), (SettingValue::Int(15), ValueSource::Device));
}
