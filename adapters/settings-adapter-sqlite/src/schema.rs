//! Database schema initialization
//!
//! Creates the tables and indexes used by the adapter. Every statement is idempotent,
//! so running it on an existing database is a no-op.

use sqlx::SqlitePool;

/// Initialize the database schema with all required tables and indexes
pub(crate) async fn init_db(db: &SqlitePool) -> Result<(), sqlx::Error> {
	let mut tx = db.begin().await?;

	// Overrides
	//***********
	// One row per (key, scope, scope_id). A tombstone keeps its value so it can be
	// restored; writing to a tombstoned target revives the same row.
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS setting_overrides (
		ovr_id integer NOT NULL,
		key text NOT NULL,
		scope text NOT NULL,
		scope_id integer,
		value text NOT NULL,
		updated_at integer NOT NULL,
		updated_by text,
		deleted_at integer,
		PRIMARY KEY(ovr_id)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE UNIQUE INDEX IF NOT EXISTS idx_setting_overrides_target
		ON setting_overrides(key, scope, ifnull(scope_id, -1))",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE INDEX IF NOT EXISTS idx_setting_overrides_deleted
		ON setting_overrides(deleted_at) WHERE deleted_at IS NOT NULL",
	)
	.execute(&mut *tx)
	.await?;

	// Audit log
	//***********
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS setting_audit (
		audit_id integer PRIMARY KEY AUTOINCREMENT,
		key text NOT NULL,
		scope text NOT NULL,
		scope_id integer,
		old_value text,
		new_value text,
		actor_id text,
		actor_name text,
		remote_addr text,
		user_agent text,
		kind text NOT NULL,
		created_at integer NOT NULL
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_setting_audit_key ON setting_audit(key, audit_id)")
		.execute(&mut *tx)
		.await?;

	// Definitions
	//*************
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS definitions (
		key text NOT NULL,
		kind text NOT NULL,
		description text NOT NULL,
		value_type text,
		default_value text,
		scopes text,
		read_capability text NOT NULL,
		write_capability text NOT NULL,
		group_name text,
		PRIMARY KEY(key)
	)",
	)
	.execute(&mut *tx)
	.await?;

	// Action executions
	//*******************
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS action_executions (
		exec_id integer PRIMARY KEY AUTOINCREMENT,
		key text NOT NULL,
		success boolean NOT NULL,
		message text NOT NULL,
		actor_id text,
		actor_name text,
		created_at integer NOT NULL
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE INDEX IF NOT EXISTS idx_action_executions_key ON action_executions(key, exec_id)",
	)
	.execute(&mut *tx)
	.await?;

	tx.commit().await?;

	Ok(())
}

// vim: ts=4
