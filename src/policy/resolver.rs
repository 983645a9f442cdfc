use serde::{Deserialize, Serialize};

use super::scope::PolicyScope;
use super::value::{EffectiveValue, PolicyKind, RetentionValue};
use crate::error::Result;
use crate::store::PolicyStore;

/// The resolved pair of caps governing one scope's trimming. This is what the
/// deletion executor reads at trim time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePolicy {
    pub delay: EffectiveValue,
    pub length: EffectiveValue,
}

impl EffectivePolicy {
    #[must_use]
    pub const fn value(self, kind: PolicyKind) -> EffectiveValue {
        match kind {
            PolicyKind::Delay => self.delay,
            PolicyKind::Length => self.length,
        }
    }

    /// True when nothing will ever be trimmed on either axis.
    #[must_use]
    pub const fn is_unbounded(self) -> bool {
        self.delay.is_unbounded() && self.length.is_unbounded()
    }
}

/// Resolves the effective value for one scope and kind.
///
/// Global scope returns the stored global value directly. Conversation scope
/// collapses the universal sentinel against the global value in a single hop;
/// the global value can never itself be universal, so resolution terminates.
pub async fn resolve(
    store: &dyn PolicyStore,
    scope: &PolicyScope,
    kind: PolicyKind,
) -> Result<EffectiveValue> {
    match scope {
        PolicyScope::Global => store.global(kind).await,
        PolicyScope::Conversation(id) => match store.override_for(id, kind).await? {
            RetentionValue::Universal => store.global(kind).await,
            RetentionValue::Unbounded => Ok(EffectiveValue::Unbounded),
            RetentionValue::Limited(n) => Ok(EffectiveValue::Limited(n)),
        },
    }
}

/// Both axes resolved for one scope.
pub async fn effective_policy(
    store: &dyn PolicyStore,
    scope: &PolicyScope,
) -> Result<EffectivePolicy> {
    let delay = resolve(store, scope, PolicyKind::Delay).await?;
    let length = resolve(store, scope, PolicyKind::Length).await?;
    Ok(EffectivePolicy { delay, length })
}
