use chrono::Utc;
use rusqlite::Connection;
use tidemark::TidemarkError;
use tidemark::policy::{ConversationId, EffectiveValue, PolicyKind, RetentionValue};
use tidemark::store::PolicyStore;

use super::temp_store;

#[tokio::test]
async fn schema_contains_policy_tables_and_version() {
    let (_tmp, path, _store) = temp_store().await;
    let conn = Connection::open(&path).expect("open db");

    for table in [
        "policy_schema_meta",
        "global_policies",
        "conversation_overrides",
        "legacy_trim_settings",
        "applied_migrations",
    ] {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table],
                |row| row.get(0),
            )
            .expect("query table");
        assert_eq!(count, 1, "missing table {table}");
    }

    let version: String = conn
        .query_row(
            "SELECT value FROM policy_schema_meta WHERE key='policy_schema_version'",
            [],
            |row| row.get(0),
        )
        .expect("query schema version");
    assert_eq!(version, "1");
}

#[tokio::test]
async fn override_columns_default_to_the_universal_sentinel() {
    let (_tmp, path, store) = temp_store().await;

    // Insert a bare row the way a conversation-creation hook would, without
    // touching the policy columns at all.
    {
        let conn = Connection::open(&path).expect("open db");
        conn.execute(
            "INSERT INTO conversation_overrides (conversation_id, updated_at) VALUES (?1, ?2)",
            rusqlite::params!["fresh-row", Utc::now().to_rfc3339()],
        )
        .expect("insert bare row");
    }

    let id = ConversationId::new("fresh-row").unwrap();
    assert_eq!(
        store.override_for(&id, PolicyKind::Delay).await.unwrap(),
        RetentionValue::Universal
    );
    assert_eq!(
        store.override_for(&id, PolicyKind::Length).await.unwrap(),
        RetentionValue::Universal
    );
}

#[tokio::test]
async fn sentinels_encode_as_minus_one_and_i64_max() {
    let (_tmp, path, store) = temp_store().await;
    let id = ConversationId::new("wire-check").unwrap();

    store
        .set_global(PolicyKind::Delay, EffectiveValue::Unbounded)
        .await
        .unwrap();
    store
        .set_override(&id, PolicyKind::Length, RetentionValue::Limited(250))
        .await
        .unwrap();
    store
        .set_override(&id, PolicyKind::Delay, RetentionValue::Universal)
        .await
        .unwrap();

    let conn = Connection::open(&path).expect("open db");

    let global_delay: i64 = conn
        .query_row(
            "SELECT value FROM global_policies WHERE kind='delay'",
            [],
            |row| row.get(0),
        )
        .expect("query global delay");
    assert_eq!(global_delay, i64::MAX);

    let (trim_delay, trim_length): (i64, i64) = conn
        .query_row(
            "SELECT trim_delay, trim_length FROM conversation_overrides
             WHERE conversation_id='wire-check'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("query override row");
    assert_eq!(trim_delay, -1);
    assert_eq!(trim_length, 250);
}

#[tokio::test]
async fn undecodable_raw_value_surfaces_as_corruption() {
    let (_tmp, path, store) = temp_store().await;
    let id = ConversationId::new("poisoned").unwrap();
    store
        .set_override(&id, PolicyKind::Delay, RetentionValue::Limited(7))
        .await
        .unwrap();

    {
        let conn = Connection::open(&path).expect("open db");
        conn.execute(
            "UPDATE conversation_overrides SET trim_delay = -7 WHERE conversation_id='poisoned'",
            [],
        )
        .expect("poison raw value");
    }

    let err = store
        .override_for(&id, PolicyKind::Delay)
        .await
        .unwrap_err();
    assert!(matches!(err, TidemarkError::Store(_)), "got {err}");
    assert!(err.to_string().contains("-7"), "got {err}");
}
