use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::error::{Result, SettingsError, ValueError};
use crate::policy::{
    EffectiveValue, PolicyKind, PolicyScope, RetentionValue, is_more_restrictive,
};
use crate::store::{PolicyEvent, PolicyStore};

/// One controller's view of its policy: the raw stored value at its scope,
/// the current global fallback, and an optional candidate awaiting
/// confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsState {
    pub selected: RetentionValue,
    pub universal: EffectiveValue,
    pub pending: Option<RetentionValue>,
}

impl SettingsState {
    /// The value currently governing the scope.
    #[must_use]
    pub const fn effective(&self) -> EffectiveValue {
        self.selected.resolve_with(self.universal)
    }
}

async fn fetch_state(
    store: &dyn PolicyStore,
    scope: &PolicyScope,
    kind: PolicyKind,
    pending: Option<RetentionValue>,
) -> Result<SettingsState> {
    let universal = store.global(kind).await?;
    let selected = match scope {
        PolicyScope::Global => RetentionValue::from(universal),
        PolicyScope::Conversation(id) => store.override_for(id, kind).await?,
    };
    Ok(SettingsState {
        selected,
        universal,
        pending,
    })
}

/// Drives one settings screen: a single (scope, kind) pair.
///
/// State lives in an `ArcSwap` snapshot so readers never block; mutations
/// re-derive the snapshot and swap it whole. [`propose`](Self::propose) gates
/// destructive changes behind confirmation; [`commit`](Self::commit) awaits
/// the store write before the snapshot changes, so a resolve after commit
/// always observes the new value. Concurrent commits to the same scope and
/// kind are last-writer-wins.
pub struct SettingsController {
    store: Arc<dyn PolicyStore>,
    scope: PolicyScope,
    kind: PolicyKind,
    state: ArcSwap<SettingsState>,
}

impl SettingsController {
    /// Load current state from the store and bind the controller to it.
    pub async fn load(
        store: Arc<dyn PolicyStore>,
        scope: PolicyScope,
        kind: PolicyKind,
    ) -> Result<Self> {
        let state = fetch_state(store.as_ref(), &scope, kind, None).await?;
        Ok(Self {
            store,
            scope,
            kind,
            state: ArcSwap::from_pointee(state),
        })
    }

    #[must_use]
    pub const fn scope(&self) -> &PolicyScope {
        &self.scope
    }

    #[must_use]
    pub const fn kind(&self) -> PolicyKind {
        self.kind
    }

    /// Lock-free snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> SettingsState {
        **self.state.load()
    }

    /// The raw stored value at this controller's scope.
    #[must_use]
    pub fn selected(&self) -> RetentionValue {
        self.state().selected
    }

    /// The value currently governing this scope.
    #[must_use]
    pub fn effective(&self) -> EffectiveValue {
        self.state().effective()
    }

    /// The cached global fallback.
    #[must_use]
    pub fn universal(&self) -> EffectiveValue {
        self.state().universal
    }

    /// The candidate awaiting confirmation, if any.
    #[must_use]
    pub fn pending(&self) -> Option<RetentionValue> {
        self.state().pending
    }

    /// Propose a new value.
    ///
    /// Returns `true` when the change is more restrictive than the current
    /// effective value; the candidate then waits in `pending` until
    /// [`confirm`](Self::confirm) or [`cancel`](Self::cancel). Anything else
    /// is committed immediately and `false` is returned.
    pub async fn propose(&self, candidate: RetentionValue) -> Result<bool> {
        let candidate = candidate.validate_for(self.kind)?;
        if self.scope.is_global() && candidate.is_universal() {
            return Err(ValueError::UniversalAtGlobalScope.into());
        }

        let state = self.state();
        if is_more_restrictive(candidate, state.effective(), state.universal) {
            self.state.store(Arc::new(SettingsState {
                pending: Some(candidate),
                ..state
            }));
            tracing::debug!(
                scope = %self.scope,
                kind = %self.kind,
                %candidate,
                "destructive change pending confirmation"
            );
            return Ok(true);
        }

        self.commit(candidate).await?;
        Ok(false)
    }

    /// Commit the pending candidate after the user confirmed the warning.
    pub async fn confirm(&self) -> Result<()> {
        let Some(candidate) = self.pending() else {
            return Err(SettingsError::NoPendingChange.into());
        };
        self.commit(candidate).await
    }

    /// Drop the pending candidate without touching the store.
    pub fn cancel(&self) {
        let state = self.state();
        if state.pending.is_some() {
            self.state.store(Arc::new(SettingsState {
                pending: None,
                ..state
            }));
        }
    }

    /// Write `value` through the store at this controller's scope and kind.
    /// The write is durable before the cached snapshot updates; the snapshot
    /// update also clears any pending candidate.
    pub async fn commit(&self, value: RetentionValue) -> Result<()> {
        let value = value.validate_for(self.kind)?;
        match &self.scope {
            PolicyScope::Global => match value {
                RetentionValue::Universal => {
                    return Err(ValueError::UniversalAtGlobalScope.into());
                }
                RetentionValue::Unbounded => {
                    self.store
                        .set_global(self.kind, EffectiveValue::Unbounded)
                        .await?;
                }
                RetentionValue::Limited(n) => {
                    self.store
                        .set_global(self.kind, EffectiveValue::Limited(n))
                        .await?;
                }
            },
            PolicyScope::Conversation(id) => {
                self.store.set_override(id, self.kind, value).await?;
            }
        }

        let state = fetch_state(self.store.as_ref(), &self.scope, self.kind, None).await?;
        self.state.store(Arc::new(state));
        Ok(())
    }

    /// Re-pull the stored value and the global fallback, preserving any
    /// pending candidate (a confirmation dialog may still be up).
    pub async fn refresh(&self) -> Result<()> {
        let pending = self.pending();
        let state = fetch_state(self.store.as_ref(), &self.scope, self.kind, pending).await?;
        self.state.store(Arc::new(state));
        Ok(())
    }

    /// Whether an event affects this controller's state. Conversation
    /// controllers also track global events of their kind, since the
    /// universal fallback feeds both display and comparison.
    #[must_use]
    pub fn wants(&self, event: &PolicyEvent) -> bool {
        match event {
            PolicyEvent::GlobalChanged { kind, .. } => *kind == self.kind,
            PolicyEvent::OverrideChanged {
                conversation_id,
                kind,
                ..
            } => *kind == self.kind && self.scope.conversation_id() == Some(conversation_id),
            PolicyEvent::LegacySettingsCleared => false,
        }
    }

    /// Subscribe to the store's event bus and refresh whenever a relevant
    /// change lands. The task ends when the bus closes. A lagged receiver
    /// refreshes unconditionally, so missed events cannot leave the snapshot
    /// stale.
    pub fn spawn_refresh_task(self: &Arc<Self>) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        let mut events = controller.store.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if controller.wants(&event) => {
                        if let Err(err) = controller.refresh().await {
                            tracing::warn!(
                                scope = %controller.scope,
                                kind = %controller.kind,
                                error = %err,
                                "settings refresh failed"
                            );
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "settings event stream lagged, refreshing");
                        if let Err(err) = controller.refresh().await {
                            tracing::warn!(error = %err, "settings refresh failed after lag");
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
