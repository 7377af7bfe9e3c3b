//! Append-only audit trail of override mutations

use sqlx::{Row, SqliteConnection, SqlitePool, sqlite::SqliteRow};

use scopecfg_types::prelude::*;
use scopecfg_types::settings_adapter::OverrideTarget;

use crate::utils::*;

/// Append one audit entry on the connection of the transaction that made the change
pub(crate) async fn append(
	conn: &mut SqliteConnection,
	target: OverrideTarget<'_>,
	kind: AuditKind,
	old_value: Option<&serde_json::Value>,
	new_value: Option<&serde_json::Value>,
	ctx: &AuditContext,
	now: Timestamp,
) -> ClResult<()> {
	sqlx::query(
		"INSERT INTO setting_audit (key, scope, scope_id, old_value, new_value,
		actor_id, actor_name, remote_addr, user_agent, kind, created_at)
		VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
	)
	.bind(target.key)
	.bind(target.scope.as_str())
	.bind(target.scope_id.map(|id| id.0))
	.bind(old_value.map(ToString::to_string))
	.bind(new_value.map(ToString::to_string))
	.bind(ctx.actor_id.as_deref())
	.bind(ctx.actor_name.as_deref())
	.bind(ctx.remote_addr.as_deref())
	.bind(ctx.user_agent.as_deref())
	.bind(kind.as_str())
	.bind(now.0)
	.execute(conn)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	Ok(())
}

fn read_entry(row: &SqliteRow) -> Result<AuditEntry, sqlx::Error> {
	let old_value: Option<&str> = row.try_get("old_value")?;
	let new_value: Option<&str> = row.try_get("new_value")?;
	let kind: &str = row.try_get("kind")?;

	Ok(AuditEntry {
		audit_id: row.try_get::<i64, _>("audit_id")? as u64,
		key: row.try_get("key")?,
		scope: parse_scope(row.try_get("scope")?)?,
		scope_id: row.try_get::<Option<i64>, _>("scope_id")?.map(ScopeId),
		old_value: old_value.map(parse_json).transpose()?,
		new_value: new_value.map(parse_json).transpose()?,
		actor_id: row.try_get("actor_id")?,
		actor_name: row.try_get("actor_name")?,
		remote_addr: row.try_get("remote_addr")?,
		user_agent: row.try_get("user_agent")?,
		kind: AuditKind::parse(kind).map_err(|err| sqlx::Error::Decode(err.to_string().into()))?,
		created_at: row.try_get("created_at").map(Timestamp)?,
	})
}

/// List audit entries, newest first
pub(crate) async fn list(db: &SqlitePool, key: Option<&str>, limit: u32) -> ClResult<Vec<AuditEntry>> {
	let mut query = sqlx::QueryBuilder::new(
		"SELECT audit_id, key, scope, scope_id, old_value, new_value, actor_id, actor_name,
		remote_addr, user_agent, kind, created_at FROM setting_audit",
	);
	if let Some(key) = key {
		query.push(" WHERE key=").push_bind(key);
	}
	query.push(" ORDER BY audit_id DESC LIMIT ").push_bind(i64::from(limit));

	let rows = query
		.build()
		.fetch_all(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	collect_res(rows.iter().map(read_entry))
}

// vim: ts=4
