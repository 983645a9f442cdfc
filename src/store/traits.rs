use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::events::EventReceiver;
use crate::error::Result;
use crate::policy::{ConversationId, EffectiveValue, PolicyKind, RetentionValue};

/// Snapshot of the pre-migration global trim settings: a trim-by-length flag
/// with its count, and a coarse keep-messages duration menu id. All three are
/// cleared once the legacy migration has translated them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacySettings {
    pub trim_by_length_enabled: bool,
    pub legacy_length: i64,
    pub keep_messages_duration_id: i64,
}

impl LegacySettings {
    #[must_use]
    pub const fn is_cleared(&self) -> bool {
        !self.trim_by_length_enabled && self.legacy_length == 0 && self.keep_messages_duration_id == 0
    }
}

/// Async policy persistence contract.
///
/// The global slot is typed [`EffectiveValue`], so the universal sentinel can
/// never be stored there; per-conversation overrides default to
/// `RetentionValue::Universal` until explicitly set. Every committed write is
/// followed by a [`PolicyEvent`](super::events::PolicyEvent) on the store's
/// broadcast bus, after the write is durable.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    fn name(&self) -> &'static str;

    async fn health_check(&self) -> bool;

    /// The universal value governing conversations without an override.
    async fn global(&self, kind: PolicyKind) -> Result<EffectiveValue>;

    async fn set_global(&self, kind: PolicyKind, value: EffectiveValue) -> Result<()>;

    /// The stored override for one conversation. `Universal` when the
    /// conversation has never chosen its own value.
    async fn override_for(&self, id: &ConversationId, kind: PolicyKind) -> Result<RetentionValue>;

    /// Upserts the override row, rejecting values that fail boundary
    /// validation for the kind.
    async fn set_override(
        &self,
        id: &ConversationId,
        kind: PolicyKind,
        value: RetentionValue,
    ) -> Result<()>;

    async fn legacy_settings(&self) -> Result<LegacySettings>;

    /// Installs legacy settings wholesale, as an importer of old app data
    /// would. The legacy migration is the only consumer that reads them back.
    async fn set_legacy_settings(&self, settings: LegacySettings) -> Result<()>;

    /// Removes the legacy representation so the migration cannot re-read it.
    async fn clear_legacy_settings(&self) -> Result<()>;

    async fn migration_applied(&self, key: &str) -> Result<bool>;

    /// Records a migration as done. Callers mark only after the migration
    /// body succeeded; an unmarked key is retried on the next startup.
    async fn mark_migration_applied(&self, key: &str) -> Result<()>;

    fn subscribe(&self) -> EventReceiver;
}
