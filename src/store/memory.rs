use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::events::{EventReceiver, EventSender, PolicyEvent, emit, event_bus};
use super::sqlite::DEFAULT_EVENT_CAPACITY;
use super::traits::{LegacySettings, PolicyStore};
use crate::error::{Result, StoreError};
use crate::policy::{ConversationId, EffectiveValue, PolicyKind, RetentionValue};

/// In-memory policy store with the same contract as the SQLite one: global
/// values default to unbounded, overrides default to the universal sentinel.
/// Used by tests and by embedders that keep settings elsewhere.
pub struct MemoryPolicyStore {
    globals: Mutex<HashMap<PolicyKind, EffectiveValue>>,
    overrides: Mutex<HashMap<(ConversationId, PolicyKind), RetentionValue>>,
    legacy: Mutex<LegacySettings>,
    applied: Mutex<HashSet<String>>,
    events: EventSender,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|err| StoreError::Unavailable(format!("state lock poisoned: {err}")).into())
}

impl MemoryPolicyStore {
    #[must_use]
    pub fn new(event_capacity: usize) -> Self {
        let (events, _) = event_bus(event_capacity);
        Self {
            globals: Mutex::new(HashMap::new()),
            overrides: Mutex::new(HashMap::new()),
            legacy: Mutex::new(LegacySettings::default()),
            applied: Mutex::new(HashSet::new()),
            events,
        }
    }
}

impl Default for MemoryPolicyStore {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn global(&self, kind: PolicyKind) -> Result<EffectiveValue> {
        Ok(lock(&self.globals)?
            .get(&kind)
            .copied()
            .unwrap_or(EffectiveValue::Unbounded))
    }

    async fn set_global(&self, kind: PolicyKind, value: EffectiveValue) -> Result<()> {
        RetentionValue::from(value).validate_for(kind)?;
        lock(&self.globals)?.insert(kind, value);
        emit(&self.events, PolicyEvent::GlobalChanged { kind, value });
        Ok(())
    }

    async fn override_for(&self, id: &ConversationId, kind: PolicyKind) -> Result<RetentionValue> {
        Ok(lock(&self.overrides)?
            .get(&(id.clone(), kind))
            .copied()
            .unwrap_or(RetentionValue::Universal))
    }

    async fn set_override(
        &self,
        id: &ConversationId,
        kind: PolicyKind,
        value: RetentionValue,
    ) -> Result<()> {
        let value = value.validate_for(kind)?;
        lock(&self.overrides)?.insert((id.clone(), kind), value);
        emit(
            &self.events,
            PolicyEvent::OverrideChanged {
                conversation_id: id.clone(),
                kind,
                value,
            },
        );
        Ok(())
    }

    async fn legacy_settings(&self) -> Result<LegacySettings> {
        Ok(*lock(&self.legacy)?)
    }

    async fn set_legacy_settings(&self, settings: LegacySettings) -> Result<()> {
        *lock(&self.legacy)? = settings;
        Ok(())
    }

    async fn clear_legacy_settings(&self) -> Result<()> {
        *lock(&self.legacy)? = LegacySettings::default();
        emit(&self.events, PolicyEvent::LegacySettingsCleared);
        Ok(())
    }

    async fn migration_applied(&self, key: &str) -> Result<bool> {
        Ok(lock(&self.applied)?.contains(key))
    }

    async fn mark_migration_applied(&self, key: &str) -> Result<()> {
        lock(&self.applied)?.insert(key.to_string());
        Ok(())
    }

    fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }
}
