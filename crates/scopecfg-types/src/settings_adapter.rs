//! Adapter that persists setting overrides, their audit trail, and action execution history.
//!
//! Every mutating method runs as one storage transaction that writes the override row and
//! appends the matching audit entry together. Implementations must serialize concurrent
//! writers to the same target so that no mutation is lost.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::audit::{AuditContext, AuditEntry};
use crate::error::ClResult;
use crate::types::{ScopeId, SettingScope, Timestamp};

/// Row address of an override
#[derive(Debug, Clone, Copy)]
pub struct OverrideTarget<'a> {
	pub key: &'a str,
	pub scope: SettingScope,
	pub scope_id: Option<ScopeId>,
}

/// A stored override (active, or a tombstone when `deleted_at` is set)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingOverride {
	pub key: Box<str>,
	pub scope: SettingScope,
	pub scope_id: Option<ScopeId>,
	pub value: serde_json::Value,
	pub updated_at: Timestamp,
	pub updated_by: Option<Box<str>>,
	pub deleted_at: Option<Timestamp>,
}

/// Storage mirror of a setting or action definition, for introspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDefinition {
	pub key: Box<str>,
	/// "setting" or "action"
	pub kind: Box<str>,
	pub description: Box<str>,
	pub value_type: Option<Box<str>>,
	pub default_value: Option<Box<str>>,
	pub scopes: Option<Box<str>>,
	pub read_capability: Box<str>,
	pub write_capability: Box<str>,
	pub group_name: Option<Box<str>>,
}

/// Outcome of one action invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionExecutionRecord {
	pub exec_id: u64,
	pub key: Box<str>,
	pub success: bool,
	pub message: Box<str>,
	pub actor_id: Option<Box<str>>,
	pub actor_name: Option<Box<str>>,
	pub created_at: Timestamp,
}

#[async_trait]
pub trait SettingsAdapter: Debug + Send + Sync {
	// Overrides
	//***********

	/// Read the active override of a target. Tombstones are never returned.
	async fn read_override(&self, target: OverrideTarget<'_>) -> ClResult<Option<SettingOverride>>;

	/// List every stored row of a key across all scopes
	async fn list_overrides(
		&self,
		key: &str,
		include_deleted: bool,
	) -> ClResult<Vec<SettingOverride>>;

	/// Create, replace, or revive an override and append a `set` audit entry.
	/// Returns the value that was active before the write, if any.
	async fn write_override(
		&self,
		target: OverrideTarget<'_>,
		value: &serde_json::Value,
		ctx: &AuditContext,
		now: Timestamp,
	) -> ClResult<Option<serde_json::Value>>;

	/// Tombstone an active override and append a `delete` audit entry.
	/// Fails with `OverrideNotFound` when there is no active row. Returns the deleted value.
	async fn soft_delete_override(
		&self,
		target: OverrideTarget<'_>,
		ctx: &AuditContext,
		now: Timestamp,
	) -> ClResult<serde_json::Value>;

	/// Revive a tombstone with its stored value and append a `restore` audit entry.
	/// Fails with `OverrideNotFound` when there is no tombstone. Returns the restored value.
	async fn restore_override(
		&self,
		target: OverrideTarget<'_>,
		ctx: &AuditContext,
		now: Timestamp,
	) -> ClResult<serde_json::Value>;

	/// Permanently remove tombstones deleted at or before `cutoff`. Returns the number removed.
	async fn purge_deleted(&self, cutoff: Timestamp) -> ClResult<u64>;

	// Audit log
	//***********

	/// Audit entries, newest first, optionally for a single key
	async fn list_audit(&self, key: Option<&str>, limit: u32) -> ClResult<Vec<AuditEntry>>;

	// Definitions
	//*************

	/// Upsert definition mirrors by key
	async fn sync_definitions(&self, defs: &[StoredDefinition]) -> ClResult<()>;
	async fn list_definitions(&self) -> ClResult<Vec<StoredDefinition>>;

	// Action executions
	//*******************

	async fn create_action_execution(
		&self,
		key: &str,
		success: bool,
		message: &str,
		ctx: &AuditContext,
		now: Timestamp,
	) -> ClResult<u64>;

	/// Execution records, newest first, optionally for a single action
	async fn list_action_executions(
		&self,
		key: Option<&str>,
		limit: u32,
	) -> ClResult<Vec<ActionExecutionRecord>>;
}

// vim: ts=4
