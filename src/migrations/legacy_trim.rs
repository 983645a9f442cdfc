use crate::error::{MigrationError, Result, TidemarkError};
use crate::policy::value::DAY_MS;
use crate::policy::{EffectiveValue, PolicyKind};
use crate::store::PolicyStore;

/// Ledger key for the legacy trim-settings migration.
pub const LEGACY_TRIM_MIGRATION: &str = "legacy_trim_settings";

/// Maps the legacy coarse "keep messages" duration identifier to a concrete
/// delay. Unknown identifiers (including the unset 0) mean no time-based
/// trimming.
#[must_use]
pub const fn map_legacy_duration(id: i64) -> EffectiveValue {
    match id {
        1 => EffectiveValue::Limited(365 * DAY_MS),
        2 => EffectiveValue::Limited(183 * DAY_MS),
        3 => EffectiveValue::Limited(30 * DAY_MS),
        _ => EffectiveValue::Unbounded,
    }
}

fn migration_err(err: TidemarkError) -> MigrationError {
    MigrationError::Failed(err.to_string())
}

/// Translates the old global-only trim settings into the universal Delay and
/// Length values, then clears the legacy fields.
///
/// Any failure aborts mid-way and leaves the legacy fields in place; the
/// startup runner retries the whole step on the next run. This function never
/// retries internally.
pub async fn migrate_legacy_trim_settings(store: &dyn PolicyStore) -> Result<()> {
    let legacy = store.legacy_settings().await.map_err(migration_err)?;

    if legacy.trim_by_length_enabled {
        if legacy.legacy_length > 0 {
            let length = EffectiveValue::Limited(legacy.legacy_length as u64);
            store
                .set_global(PolicyKind::Length, length)
                .await
                .map_err(migration_err)?;
            tracing::info!(
                length = legacy.legacy_length,
                "migrated legacy trim-by-length setting"
            );
        } else {
            // A zero-length policy would delete every message; the new model
            // has no such value. Leave length unlimited rather than guess.
            tracing::warn!(
                length = legacy.legacy_length,
                "legacy trim-by-length flag set without a usable length, leaving length policy unlimited"
            );
        }
    }

    let delay = map_legacy_duration(legacy.keep_messages_duration_id);
    if let EffectiveValue::Limited(ms) = delay {
        store
            .set_global(PolicyKind::Delay, delay)
            .await
            .map_err(migration_err)?;
        tracing::info!(
            duration_id = legacy.keep_messages_duration_id,
            delay_ms = ms,
            "migrated legacy keep-messages duration"
        );
    }

    store.clear_legacy_settings().await.map_err(migration_err)?;
    Ok(())
}
