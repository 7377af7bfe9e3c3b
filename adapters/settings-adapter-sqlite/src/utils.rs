//! Shared helpers for mapping sqlx results onto the adapter error type

use sqlx::{Sqlite, SqlitePool, Transaction};

use scopecfg_types::prelude::*;

pub(crate) fn inspect(err: &sqlx::Error) {
	warn!("DB: {:#?}", err);
}

/// Start a write transaction holding SQLite's write lock from the first statement
///
/// A deferred transaction that reads first cannot wait for the lock when it later writes,
/// so read-then-write mutations from other connections or processes would fail with
/// `SQLITE_BUSY` instead of queueing on the busy timeout.
pub(crate) async fn begin_write(db: &SqlitePool) -> ClResult<Transaction<'static, Sqlite>> {
	db.begin_with("BEGIN IMMEDIATE").await.inspect_err(inspect).map_err(|_| Error::DbError)
}

/// Collect row conversions, logging and masking the first failure
pub(crate) fn collect_res<T>(iter: impl Iterator<Item = Result<T, sqlx::Error>>) -> ClResult<Vec<T>> {
	let mut items = Vec::new();
	for item in iter {
		items.push(item.inspect_err(inspect).map_err(|_| Error::DbError)?);
	}
	Ok(items)
}

/// Parse a JSON column written by this adapter
pub(crate) fn parse_json(s: &str) -> Result<serde_json::Value, sqlx::Error> {
	serde_json::from_str(s).map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

pub(crate) fn parse_scope(s: &str) -> Result<SettingScope, sqlx::Error> {
	SettingScope::parse(s).map_err(|err| sqlx::Error::Decode(err.to_string().into()))
}

// vim: ts=4
