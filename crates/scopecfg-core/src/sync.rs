//! Mirror the in-memory definition catalog into storage for introspection

use scopecfg_types::settings_adapter::{SettingsAdapter, StoredDefinition};

use crate::action::FrozenActionRegistry;
use crate::prelude::*;
use crate::settings::FrozenSettingsRegistry;

/// Upsert every setting and action definition by key. Safe to run repeatedly.
pub async fn sync_to_storage(
	adapter: &dyn SettingsAdapter,
	settings: &FrozenSettingsRegistry,
	actions: &FrozenActionRegistry,
) -> ClResult<usize> {
	let defs: Vec<StoredDefinition> = settings
		.list()
		.map(|def| def.to_stored())
		.chain(actions.list().map(|def| def.to_stored()))
		.collect();

	adapter.sync_definitions(&defs).await?;
	info!("Synchronized {} definitions to storage", defs.len());
	Ok(defs.len())
}

// vim: ts=4
