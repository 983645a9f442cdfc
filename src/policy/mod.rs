pub mod resolver;
pub mod restrict;
pub mod scope;
pub mod value;

pub use resolver::{EffectivePolicy, effective_policy, resolve};
pub use restrict::{is_more_restrictive, is_more_restrictive_at};
pub use scope::{ConversationId, PolicyScope};
pub use value::{DAY_MS, EffectiveValue, PolicyKind, RetentionValue, format_delay_ms};
