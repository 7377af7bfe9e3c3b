//! Action executor
//!
//! Looks up a registered action, runs its handler, and records exactly one execution
//! record per completed run, whatever the handler reported. Unknown actions, denied
//! callers, cancellations and timeouts never ran to completion and leave no record.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::prelude::*;
use crate::settings::SettingsService;
use scopecfg_types::capability::has_capability;
use scopecfg_types::settings_adapter::{ActionExecutionRecord, SettingsAdapter};

use super::types::{ActionContext, ActionResult, FrozenActionRegistry};

pub struct ActionExecutor {
	registry: Arc<FrozenActionRegistry>,
	settings: Arc<SettingsService>,
	adapter: Arc<dyn SettingsAdapter>,
	default_timeout: Option<Duration>,
}

impl ActionExecutor {
	pub fn new(
		registry: Arc<FrozenActionRegistry>,
		settings: Arc<SettingsService>,
		default_timeout: Option<Duration>,
	) -> Self {
		let adapter = settings.adapter().clone();
		Self { registry, settings, adapter, default_timeout }
	}

	pub fn registry(&self) -> &Arc<FrozenActionRegistry> {
		&self.registry
	}

	/// Execute an action with the executor's default time limit
	pub async fn execute(
		&self,
		key: &str,
		audit: &AuditContext,
		cancel: &CancellationToken,
	) -> ClResult<ActionResult> {
		self.execute_with_timeout(key, audit, cancel, self.default_timeout).await
	}

	pub async fn execute_with_timeout(
		&self,
		key: &str,
		audit: &AuditContext,
		cancel: &CancellationToken,
		timeout: Option<Duration>,
	) -> ClResult<ActionResult> {
		let def = self.registry.lookup(key)?;
		if !has_capability(&audit.capabilities, def.capability) {
			warn!("Permission denied for action '{}' (actor {:?})", key, audit.actor_id);
			return Err(Error::PermissionDenied);
		}

		// Handlers get a child token, so a timeout stops them without touching the caller's
		let handler_cancel = cancel.child_token();
		let ctx = ActionContext { audit, settings: &self.settings, cancel: handler_cancel.clone() };
		let run = def.handler.run(ctx);
		let limited = async {
			match timeout {
				Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| Error::Timeout),
				None => Ok(run.await),
			}
		};

		let outcome = tokio::select! {
			biased;
			() = cancel.cancelled() => Err(Error::Cancelled),
			res = limited => res,
		};
		let outcome = match outcome {
			Ok(outcome) => outcome,
			Err(err) => {
				handler_cancel.cancel();
				warn!("Action '{}' did not complete: {}", key, err);
				return Err(err);
			}
		};

		let (success, message) = match outcome {
			Ok(res) => (res.success, res.message),
			Err(Error::ActionExecutionFailed(msg)) => (false, msg),
			Err(err) => (false, err.to_string()),
		};
		self.adapter
			.create_action_execution(key, success, &message, audit, Timestamp::now())
			.await?;

		if success {
			info!("Action '{}' succeeded (actor {:?}): {}", key, audit.actor_id, message);
			Ok(ActionResult { success, message })
		} else {
			warn!("Action '{}' failed (actor {:?}): {}", key, audit.actor_id, message);
			Err(Error::ActionExecutionFailed(message))
		}
	}

	/// Execution records of one action, newest first
	pub async fn history(&self, key: &str, limit: u32) -> ClResult<Vec<ActionExecutionRecord>> {
		self.registry.lookup(key)?;
		if limit == 0 {
			return Ok(Vec::new());
		}
		self.adapter
			.list_action_executions(Some(key), limit.min(crate::settings::service::MAX_LIMIT))
			.await
	}

	/// Execution records of all actions, newest first
	pub async fn recent_executions(&self, limit: u32) -> ClResult<Vec<ActionExecutionRecord>> {
		if limit == 0 {
			return Ok(Vec::new());
		}
		self.adapter
			.list_action_executions(None, limit.min(crate::settings::service::MAX_LIMIT))
			.await
	}
}

// vim: ts=4
