//! Restrictiveness comparison, the gate for destructive-trim confirmation.
//!
//! A change is "more restrictive" when the value the candidate would actually
//! enforce retains less than the currently effective value. The result only
//! decides whether the caller must obtain user confirmation before
//! committing; it never blocks the commit itself.

use super::resolver::resolve;
use super::scope::PolicyScope;
use super::value::{EffectiveValue, PolicyKind, RetentionValue};
use crate::error::Result;
use crate::store::PolicyStore;

/// Pure comparison against already-resolved state.
///
/// `current` is the effective value at the scope under edit and `universal`
/// the current global value, which is what a universal candidate enforces.
/// Strictly less retains strictly less, so equal values never require
/// confirmation.
#[must_use]
pub fn is_more_restrictive(
    candidate: RetentionValue,
    current: EffectiveValue,
    universal: EffectiveValue,
) -> bool {
    candidate.resolve_with(universal) < current
}

/// Store-resolving form: pulls the effective value at `scope` and the global
/// fallback, then applies [`is_more_restrictive`].
pub async fn is_more_restrictive_at(
    store: &dyn PolicyStore,
    scope: &PolicyScope,
    kind: PolicyKind,
    candidate: RetentionValue,
) -> Result<bool> {
    let current = resolve(store, scope, kind).await?;
    let universal = store.global(kind).await?;
    Ok(is_more_restrictive(candidate, current, universal))
}
