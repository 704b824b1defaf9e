pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::{MemoryPreferenceStore, MemoryRunStore};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
