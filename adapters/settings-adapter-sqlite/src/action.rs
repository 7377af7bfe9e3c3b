//! Action execution history

use sqlx::{Row, SqlitePool};

use scopecfg_types::prelude::*;
use scopecfg_types::settings_adapter::ActionExecutionRecord;

use crate::utils::*;

pub(crate) async fn create(
	db: &SqlitePool,
	key: &str,
	success: bool,
	message: &str,
	ctx: &AuditContext,
	now: Timestamp,
) -> ClResult<u64> {
	let res = sqlx::query(
		"INSERT INTO action_executions (key, success, message, actor_id, actor_name, created_at)
		VALUES (?, ?, ?, ?, ?, ?) RETURNING exec_id",
	)
	.bind(key)
	.bind(success)
	.bind(message)
	.bind(ctx.actor_id.as_deref())
	.bind(ctx.actor_name.as_deref())
	.bind(now.0)
	.fetch_one(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	let exec_id: i64 = res.try_get(0).inspect_err(inspect).map_err(|_| Error::DbError)?;
	Ok(exec_id as u64)
}

/// List execution records, newest first
pub(crate) async fn list(
	db: &SqlitePool,
	key: Option<&str>,
	limit: u32,
) -> ClResult<Vec<ActionExecutionRecord>> {
	let mut query = sqlx::QueryBuilder::new(
		"SELECT exec_id, key, success, message, actor_id, actor_name, created_at
		FROM action_executions",
	);
	if let Some(key) = key {
		query.push(" WHERE key=").push_bind(key);
	}
	query.push(" ORDER BY exec_id DESC LIMIT ").push_bind(i64::from(limit));

	let rows = query
		.build()
		.fetch_all(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	collect_res(rows.iter().map(|row| {
		Ok(ActionExecutionRecord {
			exec_id: row.try_get::<i64, _>("exec_id")? as u64,
			key: row.try_get("key")?,
			success: row.try_get("success")?,
			message: row.try_get("message")?,
			actor_id: row.try_get("actor_id")?,
			actor_name: row.try_get("actor_name")?,
			created_at: row.try_get("created_at").map(Timestamp)?,
		})
	}))
}

// vim: ts=4
