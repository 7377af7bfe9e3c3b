//! Scheduled purge of soft-deleted overrides

use chrono::{DateTime, Utc};
use croner::Cron;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::prelude::*;
use scopecfg_core::builtin::TOMBSTONE_RETENTION_DAYS;
use scopecfg_core::settings::SettingsService;

/// When the retention purge runs, as a five-field cron expression in UTC
#[derive(Debug, Clone)]
pub struct PurgeSchedule {
	expr: Box<str>,
	cron: Cron,
}

impl PurgeSchedule {
	pub fn parse(expr: &str) -> ClResult<Self> {
		let cron = Cron::from_str(expr.trim()).map_err(|e| {
			Error::ConfigError(format!("purge schedule '{}' is not a valid cron expression: {}", expr, e))
		})?;
		Ok(Self { expr: expr.trim().into(), cron })
	}

	/// First purge time strictly after `after`
	pub fn next_after(&self, after: Timestamp) -> ClResult<Timestamp> {
		let dt = DateTime::<Utc>::from_timestamp(after.0, 0).unwrap_or_else(Utc::now);
		match self.cron.find_next_occurrence(&dt, false) {
			Ok(next) => Ok(Timestamp(next.timestamp())),
			Err(e) => Err(Error::ConfigError(format!("purge schedule '{}' has no next run: {}", self, e))),
		}
	}
}

impl std::fmt::Display for PurgeSchedule {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.expr)
	}
}

/// Run one purge pass.
///
/// With no fixed window the system value of `settings.tombstone_retention_days` is used,
/// so operators can change it at runtime.
pub async fn purge_once(settings: &SettingsService, retention_days: Option<u32>) -> ClResult<u64> {
	let days = match retention_days {
		Some(days) => i64::from(days),
		None => settings.get_int(TOMBSTONE_RETENTION_DAYS, &ScopeContext::system()).await?,
	};
	settings.purge_older_than(days).await
}

/// Spawn the background purge loop. It stops when `shutdown` is cancelled.
pub fn spawn_purge_task(
	settings: Arc<SettingsService>,
	schedule: PurgeSchedule,
	retention_days: Option<u32>,
	shutdown: CancellationToken,
) -> JoinHandle<()> {
	info!("Retention purge scheduled: '{}'", schedule);
	tokio::spawn(async move {
		loop {
			let now = Timestamp::now();
			let next = match schedule.next_after(now) {
				Ok(next) => next,
				Err(err) => {
					error!("Retention purge stopped: {}", err);
					return;
				}
			};
			let wait = Duration::from_secs(u64::try_from(next.0 - now.0).unwrap_or(0));
			debug!("Next retention purge at {} (in {:?})", next, wait);

			tokio::select! {
				() = shutdown.cancelled() => {
					debug!("Retention purge task shutting down");
					return;
				}
				() = tokio::time::sleep(wait) => {}
			}

			match purge_once(&settings, retention_days).await {
				Ok(count) => info!("Retention purge removed {} overrides", count),
				Err(err) => warn!("Retention purge failed: {}", err),
			}
		}
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_rejects_garbage() {
		assert!(PurgeSchedule::parse("0 3 * * *").is_ok());
		assert!(matches!(PurgeSchedule::parse("every night"), Err(Error::ConfigError(_))));
		assert!(matches!(PurgeSchedule::parse("61 3 * * *"), Err(Error::ConfigError(_))));
	}

	#[test]
	fn test_next_after() {
		let schedule = PurgeSchedule::parse(" 0 3 * * * ").unwrap();
		assert_eq!(schedule.to_string(), "0 3 * * *");

		// 2024-01-01T00:00:00Z
		let midnight = Timestamp(1_704_067_200);
		assert_eq!(schedule.next_after(midnight).unwrap(), Timestamp(1_704_067_200 + 3 * 3600));

		// Exactly on a run: the next one is a day later
		let three = Timestamp(1_704_067_200 + 3 * 3600);
		assert_eq!(schedule.next_after(three).unwrap(), Timestamp(three.0 + 86_400));
	}
}

// vim: ts=4
