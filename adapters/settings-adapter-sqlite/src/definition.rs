//! Storage mirror of the in-memory definition catalog

use sqlx::{Row, SqlitePool};

use scopecfg_types::prelude::*;
use scopecfg_types::settings_adapter::StoredDefinition;

use crate::utils::*;

/// Upsert definitions by key. Running it twice with the same input leaves the same rows.
pub(crate) async fn sync(db: &SqlitePool, defs: &[StoredDefinition]) -> ClResult<()> {
	let mut tx = begin_write(db).await?;

	for def in defs {
		sqlx::query(
			"INSERT INTO definitions (key, kind, description, value_type, default_value, scopes,
			read_capability, write_capability, group_name)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
			ON CONFLICT(key) DO UPDATE SET kind=excluded.kind, description=excluded.description,
			value_type=excluded.value_type, default_value=excluded.default_value,
			scopes=excluded.scopes, read_capability=excluded.read_capability,
			write_capability=excluded.write_capability, group_name=excluded.group_name",
		)
		.bind(&*def.key)
		.bind(&*def.kind)
		.bind(&*def.description)
		.bind(def.value_type.as_deref())
		.bind(def.default_value.as_deref())
		.bind(def.scopes.as_deref())
		.bind(&*def.read_capability)
		.bind(&*def.write_capability)
		.bind(def.group_name.as_deref())
		.execute(&mut *tx)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;
	}

	tx.commit().await.inspect_err(inspect).map_err(|_| Error::DbError)?;
	Ok(())
}

pub(crate) async fn list(db: &SqlitePool) -> ClResult<Vec<StoredDefinition>> {
	let rows = sqlx::query(
		"SELECT key, kind, description, value_type, default_value, scopes,
		read_capability, write_capability, group_name FROM definitions ORDER BY key",
	)
	.fetch_all(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	collect_res(rows.iter().map(|row| {
		Ok(StoredDefinition {
			key: row.try_get("key")?,
			kind: row.try_get("kind")?,
			description: row.try_get("description")?,
			value_type: row.try_get("value_type")?,
			default_value: row.try_get("default_value")?,
			scopes: row.try_get("scopes")?,
			read_capability: row.try_get("read_capability")?,
			write_capability: row.try_get("write_capability")?,
			group_name: row.try_get("group_name")?,
		})
	}))
}

// vim: ts=4
