//! Screen-facing orchestration: the per-(scope, kind) settings controller
//! and the joint read-only snapshot.

pub mod controller;
pub mod snapshot;

pub use controller::{SettingsController, SettingsState};
pub use snapshot::{AxisSnapshot, HistorySnapshot};
