//! Startup migrations, applied exactly once per installation via the store's
//! persisted ledger.

pub mod legacy_trim;

pub use legacy_trim::{LEGACY_TRIM_MIGRATION, migrate_legacy_trim_settings};

use crate::error::{MigrationError, Result, TidemarkError};
use crate::store::PolicyStore;

fn ledger_err(err: TidemarkError) -> MigrationError {
    MigrationError::LedgerUnavailable(err.to_string())
}

/// Runs every unapplied migration serially, marking each one applied only
/// after its body succeeded. A failed migration stays unmarked and is retried
/// wholesale on the next startup.
///
/// Await this before constructing any
/// [`SettingsController`](crate::settings::SettingsController), so migration
/// writes never interleave with user-driven commits.
pub async fn run_startup_migrations(store: &dyn PolicyStore) -> Result<()> {
    if store
        .migration_applied(LEGACY_TRIM_MIGRATION)
        .await
        .map_err(ledger_err)?
    {
        tracing::debug!(migration = LEGACY_TRIM_MIGRATION, "already applied, skipping");
        return Ok(());
    }

    tracing::info!(migration = LEGACY_TRIM_MIGRATION, "running startup migration");
    migrate_legacy_trim_settings(store).await?;
    store
        .mark_migration_applied(LEGACY_TRIM_MIGRATION)
        .await
        .map_err(ledger_err)?;
    tracing::info!(migration = LEGACY_TRIM_MIGRATION, "startup migration applied");

    Ok(())
}
