use rusqlite::Connection;
use tidemark::migrations::{LEGACY_TRIM_MIGRATION, run_startup_migrations};
use tidemark::policy::{DAY_MS, EffectiveValue, PolicyKind};
use tidemark::store::{LegacySettings, PolicyStore, SqlitePolicyStore};

use super::temp_store;

#[tokio::test]
async fn legacy_settings_migrate_end_to_end() {
    let (_tmp, _path, store) = temp_store().await;
    store
        .set_legacy_settings(LegacySettings {
            trim_by_length_enabled: true,
            legacy_length: 500,
            keep_messages_duration_id: 2,
        })
        .await
        .unwrap();

    run_startup_migrations(&store).await.unwrap();

    assert_eq!(
        store.global(PolicyKind::Length).await.unwrap(),
        EffectiveValue::Limited(500)
    );
    assert_eq!(
        store.global(PolicyKind::Delay).await.unwrap(),
        EffectiveValue::Limited(183 * DAY_MS)
    );
    assert!(store.legacy_settings().await.unwrap().is_cleared());
    assert!(store.migration_applied(LEGACY_TRIM_MIGRATION).await.unwrap());

    // A second run must not clobber later user changes.
    store
        .set_global(PolicyKind::Length, EffectiveValue::Limited(9))
        .await
        .unwrap();
    run_startup_migrations(&store).await.unwrap();
    assert_eq!(
        store.global(PolicyKind::Length).await.unwrap(),
        EffectiveValue::Limited(9)
    );
}

#[tokio::test]
async fn migration_ledger_survives_reopening_the_database() {
    let (_tmp, path, store) = temp_store().await;
    run_startup_migrations(&store).await.unwrap();
    assert!(store.migration_applied(LEGACY_TRIM_MIGRATION).await.unwrap());
    store.pool().close().await;

    let reopened = SqlitePolicyStore::open(&path, 16)
        .await
        .expect("reopen policy store");
    assert!(
        reopened
            .migration_applied(LEGACY_TRIM_MIGRATION)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn failed_migration_leaves_ledger_and_legacy_fields_untouched() {
    let (_tmp, path, store) = temp_store().await;
    store
        .set_legacy_settings(LegacySettings {
            trim_by_length_enabled: true,
            legacy_length: i64::MAX,
            keep_messages_duration_id: 1,
        })
        .await
        .unwrap();

    assert!(run_startup_migrations(&store).await.is_err());

    // Witness the on-disk state with an independent driver.
    let conn = Connection::open(&path).expect("open db");
    let applied: i64 = conn
        .query_row("SELECT COUNT(*) FROM applied_migrations", [], |row| {
            row.get(0)
        })
        .expect("count applied migrations");
    assert_eq!(applied, 0);

    let legacy_rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM legacy_trim_settings", [], |row| {
            row.get(0)
        })
        .expect("count legacy rows");
    assert_eq!(legacy_rows, 1);

    // Repairing the legacy data lets the next startup complete the step.
    store
        .set_legacy_settings(LegacySettings {
            trim_by_length_enabled: true,
            legacy_length: 500,
            keep_messages_duration_id: 1,
        })
        .await
        .unwrap();
    run_startup_migrations(&store).await.unwrap();
    assert_eq!(
        store.global(PolicyKind::Delay).await.unwrap(),
        EffectiveValue::Limited(365 * DAY_MS)
    );
    assert!(store.migration_applied(LEGACY_TRIM_MIGRATION).await.unwrap());
}
