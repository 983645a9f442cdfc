use std::sync::Arc;
use std::time::Duration;

use tidemark::policy::{
    ConversationId, DAY_MS, EffectiveValue, PolicyKind, PolicyScope, RetentionValue,
};
use tidemark::settings::SettingsController;
use tidemark::store::{PolicyStore, SqlitePolicyStore};

use super::temp_store;

async fn controller(
    store: &Arc<SqlitePolicyStore>,
    scope: PolicyScope,
    kind: PolicyKind,
) -> SettingsController {
    SettingsController::load(Arc::clone(store) as Arc<dyn PolicyStore>, scope, kind)
        .await
        .expect("load controller")
}

async fn wait_until<F: Fn() -> bool>(what: &str, check: F) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn returning_to_universal_commits_silently_when_global_retains_more() {
    let (_tmp, _path, store) = temp_store().await;
    let store = Arc::new(store);
    let id = ConversationId::new("laxer-global").unwrap();

    store
        .set_global(PolicyKind::Delay, EffectiveValue::Limited(365 * DAY_MS))
        .await
        .unwrap();
    store
        .set_override(&id, PolicyKind::Delay, RetentionValue::Limited(30 * DAY_MS))
        .await
        .unwrap();

    let ctl = controller(
        &store,
        PolicyScope::Conversation(id.clone()),
        PolicyKind::Delay,
    )
    .await;
    assert_eq!(ctl.effective(), EffectiveValue::Limited(30 * DAY_MS));

    let needs_confirm = ctl.propose(RetentionValue::Universal).await.unwrap();

    assert!(!needs_confirm);
    assert_eq!(
        store.override_for(&id, PolicyKind::Delay).await.unwrap(),
        RetentionValue::Universal
    );
    assert_eq!(ctl.effective(), EffectiveValue::Limited(365 * DAY_MS));
}

#[tokio::test]
async fn returning_to_universal_requires_confirmation_when_global_retains_less() {
    let (_tmp, _path, store) = temp_store().await;
    let store = Arc::new(store);
    let id = ConversationId::new("stricter-global").unwrap();

    store
        .set_global(PolicyKind::Delay, EffectiveValue::Limited(30 * DAY_MS))
        .await
        .unwrap();
    store
        .set_override(&id, PolicyKind::Delay, RetentionValue::Limited(365 * DAY_MS))
        .await
        .unwrap();

    let ctl = controller(
        &store,
        PolicyScope::Conversation(id.clone()),
        PolicyKind::Delay,
    )
    .await;

    let needs_confirm = ctl.propose(RetentionValue::Universal).await.unwrap();

    assert!(needs_confirm);
    assert_eq!(ctl.pending(), Some(RetentionValue::Universal));
    // The store is untouched until the user confirms.
    assert_eq!(
        store.override_for(&id, PolicyKind::Delay).await.unwrap(),
        RetentionValue::Limited(365 * DAY_MS)
    );

    ctl.confirm().await.unwrap();
    assert_eq!(
        store.override_for(&id, PolicyKind::Delay).await.unwrap(),
        RetentionValue::Universal
    );
    assert_eq!(ctl.effective(), EffectiveValue::Limited(30 * DAY_MS));
}

#[tokio::test]
async fn global_length_drop_tightens_every_universal_conversation() {
    let (_tmp, _path, store) = temp_store().await;
    let store = Arc::new(store);
    let id = ConversationId::new("follows-global").unwrap();

    let global_ctl = controller(&store, PolicyScope::Global, PolicyKind::Length).await;
    let conv_ctl = controller(
        &store,
        PolicyScope::Conversation(id.clone()),
        PolicyKind::Length,
    )
    .await;
    assert_eq!(conv_ctl.effective(), EffectiveValue::Unbounded);

    // Dropping the universal policy from unlimited to 50 is destructive.
    assert!(global_ctl.propose(RetentionValue::Limited(50)).await.unwrap());
    global_ctl.confirm().await.unwrap();

    conv_ctl.refresh().await.unwrap();
    assert_eq!(conv_ctl.effective(), EffectiveValue::Limited(50));

    // Anything tighter than the new effective 50 now needs confirmation.
    assert!(conv_ctl.propose(RetentionValue::Limited(10)).await.unwrap());
    conv_ctl.cancel();
    assert_eq!(
        store.override_for(&id, PolicyKind::Length).await.unwrap(),
        RetentionValue::Universal
    );

    // A laxer override still commits without one.
    assert!(!conv_ctl.propose(RetentionValue::Limited(100)).await.unwrap());
    assert_eq!(conv_ctl.effective(), EffectiveValue::Limited(100));
}

#[tokio::test]
async fn refresh_task_keeps_conversation_controllers_current() {
    let (_tmp, _path, store) = temp_store().await;
    let store = Arc::new(store);
    let id = ConversationId::new("live-sync").unwrap();

    let global_ctl = controller(&store, PolicyScope::Global, PolicyKind::Length).await;
    let conv_ctl = Arc::new(
        controller(&store, PolicyScope::Conversation(id), PolicyKind::Length).await,
    );
    let task = conv_ctl.spawn_refresh_task();

    assert!(global_ctl.propose(RetentionValue::Limited(50)).await.unwrap());
    global_ctl.confirm().await.unwrap();

    let watcher = Arc::clone(&conv_ctl);
    wait_until("conversation controller to observe the new global", move || {
        watcher.universal() == EffectiveValue::Limited(50)
    })
    .await;
    assert_eq!(conv_ctl.effective(), EffectiveValue::Limited(50));

    task.abort();
}
