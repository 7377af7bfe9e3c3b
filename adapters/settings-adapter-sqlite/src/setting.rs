//! Setting override rows and their soft-delete lifecycle
//!
//! Each mutation runs in one transaction together with its audit entry.

use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use scopecfg_types::prelude::*;
use scopecfg_types::settings_adapter::{OverrideTarget, SettingOverride};

use crate::audit;
use crate::utils::*;

// `ifnull(scope_id, -1)` matches the unique target index, and treats the NULL system id as a value
const TARGET_WHERE: &str = "key=? AND scope=? AND ifnull(scope_id, -1)=ifnull(?, -1)";

fn read_override(row: &SqliteRow) -> Result<SettingOverride, sqlx::Error> {
	let value: &str = row.try_get("value")?;
	Ok(SettingOverride {
		key: row.try_get("key")?,
		scope: parse_scope(row.try_get("scope")?)?,
		scope_id: row.try_get::<Option<i64>, _>("scope_id")?.map(ScopeId),
		value: parse_json(value)?,
		updated_at: row.try_get("updated_at").map(Timestamp)?,
		updated_by: row.try_get("updated_by")?,
		deleted_at: row.try_get::<Option<i64>, _>("deleted_at")?.map(Timestamp),
	})
}

fn read_value(row: &SqliteRow) -> ClResult<serde_json::Value> {
	row.try_get::<&str, _>("value")
		.and_then(parse_json)
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)
}

/// Read the active override of a target
pub(crate) async fn read(
	db: &SqlitePool,
	target: OverrideTarget<'_>,
) -> ClResult<Option<SettingOverride>> {
	let row = sqlx::query(&format!(
		"SELECT key, scope, scope_id, value, updated_at, updated_by, deleted_at
		FROM setting_overrides WHERE {} AND deleted_at IS NULL",
		TARGET_WHERE
	))
	.bind(target.key)
	.bind(target.scope.as_str())
	.bind(target.scope_id.map(|id| id.0))
	.fetch_optional(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	row.as_ref()
		.map(read_override)
		.transpose()
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)
}

/// List all rows of a key, broadest scope first
pub(crate) async fn list(
	db: &SqlitePool,
	key: &str,
	include_deleted: bool,
) -> ClResult<Vec<SettingOverride>> {
	let mut query = sqlx::QueryBuilder::new(
		"SELECT key, scope, scope_id, value, updated_at, updated_by, deleted_at
		FROM setting_overrides WHERE key=",
	);
	query.push_bind(key);
	if !include_deleted {
		query.push(" AND deleted_at IS NULL");
	}
	query.push(
		" ORDER BY CASE scope WHEN 'system' THEN 0 WHEN 'tenant' THEN 1 ELSE 2 END, scope_id",
	);

	let rows = query
		.build()
		.fetch_all(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	collect_res(rows.iter().map(read_override))
}

/// Create, replace or revive an override. Returns the previously active value.
pub(crate) async fn write(
	db: &SqlitePool,
	target: OverrideTarget<'_>,
	value: &serde_json::Value,
	ctx: &AuditContext,
	now: Timestamp,
) -> ClResult<Option<serde_json::Value>> {
	let mut tx = begin_write(db).await?;

	let existing = sqlx::query(&format!(
		"SELECT ovr_id, value, deleted_at FROM setting_overrides WHERE {}",
		TARGET_WHERE
	))
	.bind(target.key)
	.bind(target.scope.as_str())
	.bind(target.scope_id.map(|id| id.0))
	.fetch_optional(&mut *tx)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	let old_value = if let Some(row) = existing {
		let ovr_id: i64 = row.try_get("ovr_id").inspect_err(inspect).map_err(|_| Error::DbError)?;
		let deleted_at: Option<i64> =
			row.try_get("deleted_at").inspect_err(inspect).map_err(|_| Error::DbError)?;
		// A tombstone has no active value to report
		let old_value = if deleted_at.is_none() { Some(read_value(&row)?) } else { None };

		sqlx::query(
			"UPDATE setting_overrides SET value=?, updated_at=?, updated_by=?, deleted_at=NULL
			WHERE ovr_id=?",
		)
		.bind(value.to_string())
		.bind(now.0)
		.bind(ctx.actor_id.as_deref())
		.bind(ovr_id)
		.execute(&mut *tx)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

		old_value
	} else {
		sqlx::query(
			"INSERT INTO setting_overrides (key, scope, scope_id, value, updated_at, updated_by)
			VALUES (?, ?, ?, ?, ?, ?)",
		)
		.bind(target.key)
		.bind(target.scope.as_str())
		.bind(target.scope_id.map(|id| id.0))
		.bind(value.to_string())
		.bind(now.0)
		.bind(ctx.actor_id.as_deref())
		.execute(&mut *tx)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

		None
	};

	audit::append(&mut *tx, target, AuditKind::Set, old_value.as_ref(), Some(value), ctx, now)
		.await?;
	tx.commit().await.inspect_err(inspect).map_err(|_| Error::DbError)?;

	Ok(old_value)
}

/// Tombstone an active override
pub(crate) async fn soft_delete(
	db: &SqlitePool,
	target: OverrideTarget<'_>,
	ctx: &AuditContext,
	now: Timestamp,
) -> ClResult<serde_json::Value> {
	let mut tx = begin_write(db).await?;

	let row = sqlx::query(&format!(
		"UPDATE setting_overrides SET deleted_at=?
		WHERE {} AND deleted_at IS NULL RETURNING value",
		TARGET_WHERE
	))
	.bind(now.0)
	.bind(target.key)
	.bind(target.scope.as_str())
	.bind(target.scope_id.map(|id| id.0))
	.fetch_optional(&mut *tx)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?
	.ok_or(Error::OverrideNotFound)?;
	let value = read_value(&row)?;

	audit::append(&mut *tx, target, AuditKind::Delete, Some(&value), None, ctx, now).await?;
	tx.commit().await.inspect_err(inspect).map_err(|_| Error::DbError)?;

	Ok(value)
}

/// Revive a tombstone, keeping its stored value
pub(crate) async fn restore(
	db: &SqlitePool,
	target: OverrideTarget<'_>,
	ctx: &AuditContext,
	now: Timestamp,
) -> ClResult<serde_json::Value> {
	let mut tx = begin_write(db).await?;

	let row = sqlx::query(&format!(
		"UPDATE setting_overrides SET deleted_at=NULL, updated_at=?, updated_by=?
		WHERE {} AND deleted_at IS NOT NULL RETURNING value",
		TARGET_WHERE
	))
	.bind(now.0)
	.bind(ctx.actor_id.as_deref())
	.bind(target.key)
	.bind(target.scope.as_str())
	.bind(target.scope_id.map(|id| id.0))
	.fetch_optional(&mut *tx)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?
	.ok_or(Error::OverrideNotFound)?;
	let value = read_value(&row)?;

	audit::append(&mut *tx, target, AuditKind::Restore, None, Some(&value), ctx, now).await?;
	tx.commit().await.inspect_err(inspect).map_err(|_| Error::DbError)?;

	Ok(value)
}

/// Remove tombstones deleted at or before `cutoff`
///
/// A single statement, so an interrupted purge leaves either everything or nothing removed
/// and a retry only counts what it actually deletes.
pub(crate) async fn purge(db: &SqlitePool, cutoff: Timestamp) -> ClResult<u64> {
	let res = sqlx::query(
		"DELETE FROM setting_overrides WHERE deleted_at IS NOT NULL AND deleted_at <= ?",
	)
	.bind(cutoff.0)
	.execute(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	Ok(res.rows_affected())
}

// vim: ts=4
