use serde::Serialize;

use crate::error::Result;
use crate::policy::{EffectiveValue, PolicyKind, PolicyScope, RetentionValue};
use crate::store::PolicyStore;

/// One axis of a [`HistorySnapshot`]: the raw stored value, the global
/// fallback it would resolve through, and the resulting effective value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AxisSnapshot {
    pub selected: RetentionValue,
    pub universal: EffectiveValue,
    pub effective: EffectiveValue,
}

impl AxisSnapshot {
    fn new(selected: RetentionValue, universal: EffectiveValue) -> Self {
        Self {
            selected,
            universal,
            effective: selected.resolve_with(universal),
        }
    }
}

/// A one-shot read of both retention axes for a scope, for summary screens
/// and the admin CLI. Unlike [`SettingsController`](super::SettingsController)
/// this holds no store handle and never refreshes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistorySnapshot {
    pub scope: PolicyScope,
    pub delay: AxisSnapshot,
    pub length: AxisSnapshot,
}

impl HistorySnapshot {
    pub async fn load(store: &dyn PolicyStore, scope: PolicyScope) -> Result<Self> {
        let delay = Self::load_axis(store, &scope, PolicyKind::Delay).await?;
        let length = Self::load_axis(store, &scope, PolicyKind::Length).await?;
        Ok(Self {
            scope,
            delay,
            length,
        })
    }

    async fn load_axis(
        store: &dyn PolicyStore,
        scope: &PolicyScope,
        kind: PolicyKind,
    ) -> Result<AxisSnapshot> {
        let universal = store.global(kind).await?;
        let selected = match scope {
            PolicyScope::Global => RetentionValue::from(universal),
            PolicyScope::Conversation(id) => store.override_for(id, kind).await?,
        };
        Ok(AxisSnapshot::new(selected, universal))
    }

    #[must_use]
    pub const fn axis(&self, kind: PolicyKind) -> &AxisSnapshot {
        match kind {
            PolicyKind::Delay => &self.delay,
            PolicyKind::Length => &self.length,
        }
    }

    #[must_use]
    pub fn selected(&self, kind: PolicyKind) -> RetentionValue {
        self.axis(kind).selected
    }

    #[must_use]
    pub fn effective(&self, kind: PolicyKind) -> EffectiveValue {
        self.axis(kind).effective
    }

    #[must_use]
    pub fn universal(&self, kind: PolicyKind) -> EffectiveValue {
        self.axis(kind).universal
    }
}
