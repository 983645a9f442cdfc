use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::policy::{ConversationId, EffectiveValue, PolicyKind, PolicyScope, RetentionValue};

/// Change notifications emitted by policy stores after a committed write.
/// Controllers subscribe and re-pull state for the scopes they care about.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PolicyEvent {
    GlobalChanged {
        kind: PolicyKind,
        value: EffectiveValue,
    },
    OverrideChanged {
        conversation_id: ConversationId,
        kind: PolicyKind,
        value: RetentionValue,
    },
    LegacySettingsCleared,
}

impl PolicyEvent {
    /// The scope the event applies to.
    #[must_use]
    pub fn scope(&self) -> PolicyScope {
        match self {
            Self::GlobalChanged { .. } | Self::LegacySettingsCleared => PolicyScope::Global,
            Self::OverrideChanged {
                conversation_id, ..
            } => PolicyScope::Conversation(conversation_id.clone()),
        }
    }

    /// The policy kind the event concerns, if it concerns one at all.
    #[must_use]
    pub const fn kind(&self) -> Option<PolicyKind> {
        match self {
            Self::GlobalChanged { kind, .. } | Self::OverrideChanged { kind, .. } => Some(*kind),
            Self::LegacySettingsCleared => None,
        }
    }
}

pub type EventSender = broadcast::Sender<PolicyEvent>;
pub type EventReceiver = broadcast::Receiver<PolicyEvent>;

/// Create a broadcast event bus with the given capacity.
pub fn event_bus(capacity: usize) -> (EventSender, EventReceiver) {
    broadcast::channel(capacity)
}

/// Best-effort emit: a send error only means nobody is subscribed.
pub(crate) fn emit(tx: &EventSender, event: PolicyEvent) {
    if tx.send(event).is_err() {
        tracing::trace!("policy event dropped, no subscribers");
    }
}
