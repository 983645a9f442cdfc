use tidemark::policy::{
    ConversationId, DAY_MS, EffectiveValue, PolicyKind, PolicyScope, RetentionValue, effective_policy,
    is_more_restrictive_at, resolve,
};
use tidemark::store::{MemoryPolicyStore, PolicyEvent, PolicyStore};

use super::temp_store;

/// Behavior both store implementations must share: defaults, fallback
/// resolution, override precedence, and event payloads.
async fn assert_store_contract(store: &dyn PolicyStore) {
    let name = store.name();
    assert!(store.health_check().await, "{name}: health check");

    // Defaults before anything is written.
    for kind in PolicyKind::ALL {
        assert_eq!(
            store.global(kind).await.unwrap(),
            EffectiveValue::Unbounded,
            "{name}: default global {kind}"
        );
    }
    let unknown = ConversationId::new("contract-unknown").unwrap();
    assert_eq!(
        store.override_for(&unknown, PolicyKind::Delay).await.unwrap(),
        RetentionValue::Universal,
        "{name}: unknown conversation"
    );

    // Overrides win; everyone else follows the global value.
    let overridden = ConversationId::new("contract-overridden").unwrap();
    let follower = ConversationId::new("contract-follower").unwrap();
    store
        .set_global(PolicyKind::Delay, EffectiveValue::Limited(365 * DAY_MS))
        .await
        .unwrap();
    store
        .set_override(
            &overridden,
            PolicyKind::Delay,
            RetentionValue::Limited(30 * DAY_MS),
        )
        .await
        .unwrap();

    let scope_overridden = PolicyScope::Conversation(overridden);
    let scope_follower = PolicyScope::Conversation(follower.clone());
    assert_eq!(
        resolve(store, &scope_overridden, PolicyKind::Delay).await.unwrap(),
        EffectiveValue::Limited(30 * DAY_MS),
        "{name}: override wins"
    );
    assert_eq!(
        resolve(store, &scope_follower, PolicyKind::Delay).await.unwrap(),
        EffectiveValue::Limited(365 * DAY_MS),
        "{name}: no override follows global"
    );

    // An explicit unbounded override beats a limited global.
    store
        .set_global(PolicyKind::Length, EffectiveValue::Limited(1000))
        .await
        .unwrap();
    store
        .set_override(&follower, PolicyKind::Length, RetentionValue::Unbounded)
        .await
        .unwrap();
    assert_eq!(
        resolve(store, &scope_follower, PolicyKind::Length).await.unwrap(),
        EffectiveValue::Unbounded,
        "{name}: unbounded override"
    );

    // Both axes bundle into one effective policy.
    let policy = effective_policy(store, &scope_overridden).await.unwrap();
    assert_eq!(policy.delay, EffectiveValue::Limited(30 * DAY_MS));
    assert_eq!(policy.length, EffectiveValue::Limited(1000));

    // Writes are observable on the event bus, after the write is durable.
    let mut events = store.subscribe();
    store
        .set_global(PolicyKind::Length, EffectiveValue::Limited(500))
        .await
        .unwrap();
    match events.recv().await.unwrap() {
        PolicyEvent::GlobalChanged { kind, value } => {
            assert_eq!(kind, PolicyKind::Length, "{name}: event kind");
            assert_eq!(value, EffectiveValue::Limited(500), "{name}: event value");
        }
        other => panic!("{name}: unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn sqlite_and_memory_stores_share_one_contract() {
    let (_tmp, _path, sqlite) = temp_store().await;
    assert_store_contract(&sqlite).await;

    let memory = MemoryPolicyStore::default();
    assert_store_contract(&memory).await;
}

#[tokio::test]
async fn universal_candidate_compares_through_the_resolved_global() {
    let (_tmp, _path, store) = temp_store().await;
    let id = ConversationId::new("universal-edge").unwrap();
    let scope = PolicyScope::Conversation(id.clone());

    // Global 365 days, override 30 days: going back to universal retains
    // MORE, so no confirmation.
    store
        .set_global(PolicyKind::Delay, EffectiveValue::Limited(365 * DAY_MS))
        .await
        .unwrap();
    store
        .set_override(&id, PolicyKind::Delay, RetentionValue::Limited(30 * DAY_MS))
        .await
        .unwrap();
    assert!(
        !is_more_restrictive_at(&store, &scope, PolicyKind::Delay, RetentionValue::Universal)
            .await
            .unwrap()
    );

    // Flip the values: now the sentinel resolves to 30 days against an
    // override of 365 days, which retains less, so the warning fires.
    store
        .set_global(PolicyKind::Delay, EffectiveValue::Limited(30 * DAY_MS))
        .await
        .unwrap();
    store
        .set_override(&id, PolicyKind::Delay, RetentionValue::Limited(365 * DAY_MS))
        .await
        .unwrap();
    assert!(
        is_more_restrictive_at(&store, &scope, PolicyKind::Delay, RetentionValue::Universal)
            .await
            .unwrap()
    );
}
