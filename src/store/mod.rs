pub mod events;
pub mod memory;
pub mod sqlite;
pub mod traits;

pub use events::{EventReceiver, EventSender, PolicyEvent, event_bus};
pub use memory::MemoryPolicyStore;
pub use sqlite::{DEFAULT_EVENT_CAPACITY, SqlitePolicyStore};
pub use traits::{LegacySettings, PolicyStore};
