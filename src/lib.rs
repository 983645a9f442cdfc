#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::unnecessary_literal_bound,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod config;
pub mod error;
pub mod migrations;
pub mod policy;
pub mod settings;
pub mod store;

pub use config::Config;
pub use error::{Result, TidemarkError};
pub use migrations::run_startup_migrations;
pub use policy::{
    ConversationId, EffectivePolicy, EffectiveValue, PolicyKind, PolicyScope, RetentionValue,
    effective_policy, is_more_restrictive, resolve,
};
pub use settings::{HistorySnapshot, SettingsController};
pub use store::{MemoryPolicyStore, PolicyEvent, PolicyStore, SqlitePolicyStore};
