//! SQLite implementation of the scopecfg settings adapter
//!
//! Overrides, the audit log, the definition mirror and action execution history all
//! live in one database file. Mutations open `BEGIN IMMEDIATE` transactions, so writers
//! from any connection or process queue on SQLite's busy timeout. The in-process write
//! lock additionally keeps this adapter's own writers off the busy-retry loop.

use async_trait::async_trait;
use sqlx::sqlite::{self, SqlitePool};
use std::{path::Path, time::Duration};
use tokio::sync::Mutex;

use scopecfg_types::prelude::*;
use scopecfg_types::settings_adapter::{
	ActionExecutionRecord, OverrideTarget, SettingOverride, SettingsAdapter, StoredDefinition,
};

mod action;
mod audit;
mod definition;
mod schema;
mod setting;
mod utils;

#[derive(Debug)]
pub struct SettingsAdapterSqlite {
	db: SqlitePool,
	write_lock: Mutex<()>,
}

impl SettingsAdapterSqlite {
	pub async fn new(path: impl AsRef<Path>) -> ClResult<Self> {
		let opts = sqlite::SqliteConnectOptions::new()
			.filename(path.as_ref())
			.create_if_missing(true)
			.journal_mode(sqlite::SqliteJournalMode::Wal)
			.busy_timeout(Duration::from_secs(10));
		let db = sqlite::SqlitePoolOptions::new()
			.max_connections(5)
			.connect_with(opts)
			.await
			.inspect_err(|err| error!("DbError: {:#?}", err))
			.or(Err(Error::DbError))?;

		schema::init_db(&db)
			.await
			.inspect_err(|err| error!("DbError: {:#?}", err))
			.or(Err(Error::DbError))?;

		info!("Settings database opened: {}", path.as_ref().display());
		Ok(Self { db, write_lock: Mutex::new(()) })
	}
}

#[async_trait]
impl SettingsAdapter for SettingsAdapterSqlite {
	// Overrides
	//***********
	async fn read_override(&self, target: OverrideTarget<'_>) -> ClResult<Option<SettingOverride>> {
		setting::read(&self.db, target).await
	}

	async fn list_overrides(
		&self,
		key: &str,
		include_deleted: bool,
	) -> ClResult<Vec<SettingOverride>> {
		setting::list(&self.db, key, include_deleted).await
	}

	async fn write_override(
		&self,
		target: OverrideTarget<'_>,
		value: &serde_json::Value,
		ctx: &AuditContext,
		now: Timestamp,
	) -> ClResult<Option<serde_json::Value>> {
		let _guard = self.write_lock.lock().await;
		setting::write(&self.db, target, value, ctx, now).await
	}

	async fn soft_delete_override(
		&self,
		target: OverrideTarget<'_>,
		ctx: &AuditContext,
		now: Timestamp,
	) -> ClResult<serde_json::Value> {
		let _guard = self.write_lock.lock().await;
		setting::soft_delete(&self.db, target, ctx, now).await
	}

	async fn restore_override(
		&self,
		target: OverrideTarget<'_>,
		ctx: &AuditContext,
		now: Timestamp,
	) -> ClResult<serde_json::Value> {
		let _guard = self.write_lock.lock().await;
		setting::restore(&self.db, target, ctx, now).await
	}

	async fn purge_deleted(&self, cutoff: Timestamp) -> ClResult<u64> {
		let _guard = self.write_lock.lock().await;
		setting::purge(&self.db, cutoff).await
	}

	// Audit log
	//***********
	async fn list_audit(&self, key: Option<&str>, limit: u32) -> ClResult<Vec<AuditEntry>> {
		audit::list(&self.db, key, limit).await
	}

	// Definitions
	//*************
	async fn sync_definitions(&self, defs: &[StoredDefinition]) -> ClResult<()> {
		let _guard = self.write_lock.lock().await;
		definition::sync(&self.db, defs).await
	}

	async fn list_definitions(&self) -> ClResult<Vec<StoredDefinition>> {
		definition::list(&self.db).await
	}

	// Action executions
	//*******************
	async fn create_action_execution(
		&self,
		key: &str,
		success: bool,
		message: &str,
		ctx: &AuditContext,
		now: Timestamp,
	) -> ClResult<u64> {
		let _guard = self.write_lock.lock().await;
		action::create(&self.db, key, success, message, ctx, now).await
	}

	async fn list_action_executions(
		&self,
		key: Option<&str>,
		limit: u32,
	) -> ClResult<Vec<ActionExecutionRecord>> {
		action::list(&self.db, key, limit).await
	}
}

// vim: ts=4
