//! Settings service: scope resolution, audited mutations, and history queries

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::prelude::*;
use scopecfg_types::capability::has_capability;
use scopecfg_types::settings_adapter::{OverrideTarget, SettingOverride, SettingsAdapter};

use super::cache::ResolveCache;
use super::types::{FrozenSettingsRegistry, SettingDefinition, SettingValue, ValueType};

/// Upper bound for history and listing queries
pub const MAX_LIMIT: u32 = 1000;

/// Where an effective value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueSource {
	#[serde(rename = "device")]
	Device,
	#[serde(rename = "tenant")]
	Tenant,
	/// An explicit system-scope override
	#[serde(rename = "system")]
	System,
	/// No override anywhere: the definition's static default
	#[serde(rename = "default")]
	Default,
}

impl From<SettingScope> for ValueSource {
	fn from(scope: SettingScope) -> Self {
		match scope {
			SettingScope::Device => ValueSource::Device,
			SettingScope::Tenant => ValueSource::Tenant,
			SettingScope::System => ValueSource::System,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSetting {
	pub value: SettingValue,
	pub source: ValueSource,
}

#[derive(Debug, Clone)]
pub struct SettingsOpts {
	/// Capacity of the resolution cache. `0` disables caching.
	pub cache_size: usize,
	/// Permit soft-deleting the system-scope override
	pub allow_system_delete: bool,
}

impl Default for SettingsOpts {
	fn default() -> Self {
		Self { cache_size: 1000, allow_system_delete: false }
	}
}

/// Scopes to probe for a context, most specific first
///
/// Device and tenant are only probed when the context names them, and only scopes the
/// definition can be overridden at are included. System is always last.
fn scope_probes(ctx: &ScopeContext, def: &SettingDefinition) -> Vec<(SettingScope, Option<ScopeId>)> {
	[
		ctx.device.map(|id| (SettingScope::Device, Some(id))),
		ctx.tenant.map(|id| (SettingScope::Tenant, Some(id))),
		Some((SettingScope::System, None)),
	]
	.into_iter()
	.flatten()
	.filter(|(scope, _)| def.allows_scope(*scope))
	.collect()
}

fn clamp_limit(limit: u32) -> u32 {
	limit.min(MAX_LIMIT)
}

/// Evicts cached resolutions when dropped
///
/// Held across the storage call of a mutation, so the eviction also happens when the
/// caller's future is dropped after the commit but before the call returns.
struct InvalidateGuard<'a> {
	service: &'a SettingsService,
	/// `None` evicts every key
	key: Option<&'a str>,
}

impl Drop for InvalidateGuard<'_> {
	fn drop(&mut self) {
		match self.key {
			Some(key) => self.service.invalidate(key),
			None => self.service.clear_cache(),
		}
	}
}

/// Settings service - main interface for resolving and managing settings
pub struct SettingsService {
	registry: Arc<FrozenSettingsRegistry>,
	adapter: Arc<dyn SettingsAdapter>,
	cache: Option<ResolveCache>,
	allow_system_delete: bool,
}

impl SettingsService {
	pub fn new(
		registry: Arc<FrozenSettingsRegistry>,
		adapter: Arc<dyn SettingsAdapter>,
		opts: &SettingsOpts,
	) -> Self {
		Self {
			registry,
			adapter,
			cache: NonZeroUsize::new(opts.cache_size).map(ResolveCache::new),
			allow_system_delete: opts.allow_system_delete,
		}
	}

	/// Get reference to registry (for listing all settings)
	pub fn registry(&self) -> &Arc<FrozenSettingsRegistry> {
		&self.registry
	}

	pub fn adapter(&self) -> &Arc<dyn SettingsAdapter> {
		&self.adapter
	}

	fn invalidate(&self, key: &str) {
		if let Some(cache) = &self.cache {
			cache.invalidate_key(key);
		}
	}

	/// Drop every cached resolution
	pub fn clear_cache(&self) {
		if let Some(cache) = &self.cache {
			cache.clear();
		}
	}

	/// Invalidate `key` now and once more when the guard drops
	fn invalidation<'a>(&'a self, key: Option<&'a str>) -> InvalidateGuard<'a> {
		let guard = InvalidateGuard { service: self, key };
		match key {
			Some(key) => self.invalidate(key),
			None => self.clear_cache(),
		}
		guard
	}

	// Resolution
	//************

	/// Effective value of a setting for a context (device -> tenant -> system -> default)
	pub async fn resolve(&self, key: &str, ctx: &ScopeContext) -> ClResult<ResolvedSetting> {
		let def = self.registry.lookup(key)?;

		let generation = if let Some(cache) = &self.cache {
			if let Some(hit) = cache.get(key, ctx) {
				debug!("Setting cache hit: {} {:?}", key, ctx);
				return Ok(hit);
			}
			cache.generation()
		} else {
			0
		};

		let mut resolved = None;
		for (scope, scope_id) in scope_probes(ctx, def) {
			let target = OverrideTarget { key, scope, scope_id };
			let Some(row) = self.adapter.read_override(target).await? else {
				continue;
			};
			let decoded = match def.value_type {
				// Any JSON is a valid value here, whatever shape it happens to have
				ValueType::Json => Ok(SettingValue::Json(row.value)),
				_ => serde_json::from_value::<SettingValue>(row.value).map_err(Error::from),
			};
			match decoded.and_then(|value| def.validate(&value).map(|()| value)) {
				Ok(value) => {
					resolved = Some(ResolvedSetting { value, source: scope.into() });
					break;
				}
				Err(err) => {
					// Stored under an older definition; fall through to the next scope
					warn!("Ignoring invalid {} override of '{}' ({:?}): {}", scope, key, scope_id, err);
				}
			}
		}

		let resolved = resolved.unwrap_or_else(|| ResolvedSetting {
			value: def.default.clone(),
			source: ValueSource::Default,
		});

		if let Some(cache) = &self.cache {
			cache.put(generation, key, *ctx, resolved.clone());
		}
		Ok(resolved)
	}

	/// Effective value only
	pub async fn get(&self, key: &str, ctx: &ScopeContext) -> ClResult<SettingValue> {
		Ok(self.resolve(key, ctx).await?.value)
	}

	// Mutations
	//***********

	fn check_write(&self, def: &SettingDefinition, audit: &AuditContext) -> ClResult<()> {
		if has_capability(&audit.capabilities, def.write_capability) {
			Ok(())
		} else {
			warn!(
				"Permission denied for setting '{}' (actor {:?}): requires {}",
				def.key,
				audit.actor_id,
				def.write_capability.as_str()
			);
			Err(Error::PermissionDenied)
		}
	}

	fn check_target(
		def: &SettingDefinition,
		scope: SettingScope,
		scope_id: Option<ScopeId>,
	) -> ClResult<()> {
		scope.check_scope_id(scope_id)?;
		if !def.allows_scope(scope) {
			return Err(Error::InvalidScope(format!(
				"setting '{}' cannot be overridden at {} scope",
				def.key, scope
			)));
		}
		Ok(())
	}

	/// Create or replace an override. A tombstoned override is revived with the new value.
	pub async fn set(
		&self,
		key: &str,
		value: SettingValue,
		scope: SettingScope,
		scope_id: Option<ScopeId>,
		audit: &AuditContext,
	) -> ClResult<()> {
		let def = self.registry.lookup(key)?;
		self.check_write(def, audit)?;
		Self::check_target(def, scope, scope_id)?;
		def.validate(&value)?;

		let json_value = serde_json::to_value(&value)?;
		let target = OverrideTarget { key, scope, scope_id };
		let old = {
			let _invalidate = self.invalidation(Some(key));
			self.adapter.write_override(target, &json_value, audit, Timestamp::now()).await?
		};

		info!(
			"Setting '{}' set at {} {:?} by {:?}: {:?} -> {}",
			key, scope, scope_id, audit.actor_id, old, json_value
		);
		Ok(())
	}

	/// `set` with a raw string value, parsed according to the definition's type
	pub async fn set_raw(
		&self,
		key: &str,
		raw: &str,
		scope: SettingScope,
		scope_id: Option<ScopeId>,
		audit: &AuditContext,
	) -> ClResult<()> {
		let value = self.registry.lookup(key)?.value_type.parse(raw)?;
		self.set(key, value, scope, scope_id, audit).await
	}

	/// Tombstone an override so resolution falls through to the next broader scope
	pub async fn soft_delete(
		&self,
		key: &str,
		scope: SettingScope,
		scope_id: Option<ScopeId>,
		audit: &AuditContext,
	) -> ClResult<()> {
		let def = self.registry.lookup(key)?;
		self.check_write(def, audit)?;
		scope.check_scope_id(scope_id)?;
		if scope == SettingScope::System && !self.allow_system_delete {
			return Err(Error::InvalidScope(format!(
				"the system value of '{}' is the ultimate fallback and cannot be deleted",
				key
			)));
		}
		Self::check_target(def, scope, scope_id)?;

		let target = OverrideTarget { key, scope, scope_id };
		let value = {
			let _invalidate = self.invalidation(Some(key));
			self.adapter.soft_delete_override(target, audit, Timestamp::now()).await?
		};

		info!("Setting '{}' deleted at {} {:?} by {:?} (was {})", key, scope, scope_id, audit.actor_id, value);
		Ok(())
	}

	/// Revive a tombstoned override with the value it had when it was deleted
	pub async fn restore(
		&self,
		key: &str,
		scope: SettingScope,
		scope_id: Option<ScopeId>,
		audit: &AuditContext,
	) -> ClResult<()> {
		let def = self.registry.lookup(key)?;
		self.check_write(def, audit)?;
		Self::check_target(def, scope, scope_id)?;

		let target = OverrideTarget { key, scope, scope_id };
		let value = {
			let _invalidate = self.invalidation(Some(key));
			self.adapter.restore_override(target, audit, Timestamp::now()).await?
		};

		info!("Setting '{}' restored at {} {:?} by {:?}: {}", key, scope, scope_id, audit.actor_id, value);
		Ok(())
	}

	/// Permanently remove overrides soft-deleted at least `days` days ago.
	/// `0` purges every tombstone. Negative windows are rejected.
	pub async fn purge_older_than(&self, days: i64) -> ClResult<u64> {
		let days = u32::try_from(days).map_err(|_| {
			Error::ValidationFailed(format!("retention window must be 0..={} days, got {}", u32::MAX, days))
		})?;

		let cutoff = Timestamp::now().sub_days(days);
		let count = {
			let _invalidate = self.invalidation(None);
			self.adapter.purge_deleted(cutoff).await?
		};

		info!("Purged {} soft-deleted overrides older than {} days", count, days);
		Ok(count)
	}

	// Queries
	//*********

	/// Audit entries of one setting, newest first
	pub async fn history(&self, key: &str, limit: u32) -> ClResult<Vec<AuditEntry>> {
		self.registry.lookup(key)?;
		if limit == 0 {
			return Ok(Vec::new());
		}
		self.adapter.list_audit(Some(key), clamp_limit(limit)).await
	}

	/// Audit entries of all settings, newest first
	pub async fn recent_changes(&self, limit: u32) -> ClResult<Vec<AuditEntry>> {
		if limit == 0 {
			return Ok(Vec::new());
		}
		self.adapter.list_audit(None, clamp_limit(limit)).await
	}

	/// Every stored row of a setting across scopes
	pub async fn list_overrides(
		&self,
		key: &str,
		include_deleted: bool,
	) -> ClResult<Vec<SettingOverride>> {
		self.registry.lookup(key)?;
		self.adapter.list_overrides(key, include_deleted).await
	}

	/// Definitions visible to a caller, in registration order
	pub fn list_definitions<'a>(
		&'a self,
		caps: &'a CapabilitySet,
	) -> impl Iterator<Item = &'a SettingDefinition> + 'a {
		self.registry.list().filter(move |def| has_capability(caps, def.read_capability))
	}

	// Typed getters
	//***************

	pub async fn get_string(&self, key: &str, ctx: &ScopeContext) -> ClResult<String> {
		match self.get(key, ctx).await? {
			SettingValue::String(s) => Ok(s),
			v => Err(Error::ValidationFailed(format!(
				"Setting '{}' is not a string, got {}",
				key,
				v.type_name()
			))),
		}
	}

	pub async fn get_int(&self, key: &str, ctx: &ScopeContext) -> ClResult<i64> {
		match self.get(key, ctx).await? {
			SettingValue::Int(i) => Ok(i),
			v => Err(Error::ValidationFailed(format!(
				"Setting '{}' is not an integer, got {}",
				key,
				v.type_name()
			))),
		}
	}

	pub async fn get_bool(&self, key: &str, ctx: &ScopeContext) -> ClResult<bool> {
		match self.get(key, ctx).await? {
			SettingValue::Bool(b) => Ok(b),
			v => Err(Error::ValidationFailed(format!(
				"Setting '{}' is not a boolean, got {}",
				key,
				v.type_name()
			))),
		}
	}

	pub async fn get_json(&self, key: &str, ctx: &ScopeContext) -> ClResult<serde_json::Value> {
		match self.get(key, ctx).await? {
			SettingValue::Json(j) => Ok(j),
			v => Err(Error::ValidationFailed(format!(
				"Setting '{}' is not JSON, got {}",
				key,
				v.type_name()
			))),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn def(scopes: &[SettingScope]) -> SettingDefinition {
		SettingDefinition::builder("k")
			.description("k")
			.default(SettingValue::Int(1))
			.scopes(scopes.iter().copied())
			.build()
			.unwrap()
	}

	#[test]
	fn test_scope_probe_order() {
		let all = def(&[SettingScope::System, SettingScope::Tenant, SettingScope::Device]);
		let ctx = ScopeContext::system().with_tenant(ScopeId(3)).with_device(ScopeId(42));
		assert_eq!(
			scope_probes(&ctx, &all),
			vec![
				(SettingScope::Device, Some(ScopeId(42))),
				(SettingScope::Tenant, Some(ScopeId(3))),
				(SettingScope::System, None),
			]
		);
		assert_eq!(scope_probes(&ScopeContext::system(), &all), vec![(SettingScope::System, None)]);
	}

	#[test]
	fn test_scope_probes_skip_disallowed_scopes() {
		let tenant_only = def(&[SettingScope::Tenant]);
		let ctx = ScopeContext::system().with_tenant(ScopeId(3)).with_device(ScopeId(42));
		assert_eq!(scope_probes(&ctx, &tenant_only), vec![(SettingScope::Tenant, Some(ScopeId(3)))]);
	}

	#[test]
	fn test_clamp_limit() {
		assert_eq!(clamp_limit(10), 10);
		assert_eq!(clamp_limit(50_000), MAX_LIMIT);
	}
}

// vim: ts=4
