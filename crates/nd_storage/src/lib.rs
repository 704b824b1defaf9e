use nd_core::{Error, PreferenceStore, Result, RunStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

pub mod backends;

pub use backends::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

impl std::str::FromStr for StoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(Error::Configuration(format!(
                "unknown store '{}'. Available stores: memory, sqlite",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: PathBuf::from("digests.db"),
        }
    }
}

/// Run and preference stores sharing one backend.
#[derive(Clone)]
pub struct Stores {
    pub runs: Arc<dyn RunStore>,
    pub preferences: Arc<dyn PreferenceStore>,
}

pub async fn create_stores(config: &StoreConfig) -> Result<Stores> {
    match config.backend {
        StoreBackend::Memory => Ok(Stores {
            runs: Arc::new(MemoryRunStore::new()),
            preferences: Arc::new(MemoryPreferenceStore::new()),
        }),
        #[cfg(feature = "sqlite")]
        StoreBackend::Sqlite => {
            let store = Arc::new(SqliteStore::new_with_path(&config.path).await?);
            tracing::info!(path = %config.path.display(), "💾 SQLite store opened");
            Ok(Stores {
                runs: store.clone(),
                preferences: store,
            })
        }
        #[cfg(not(feature = "sqlite"))]
        StoreBackend::Sqlite => Err(Error::Configuration(
            "this build does not include the sqlite store".to_string(),
        )),
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_stores, StoreBackend, StoreConfig, Stores};
}
