//! Persistence layer for the cube world simulation.
//!
//! The core only ever sees [`KeyValueStore`]: `load(key)` and
//! `save(key, blob)` over JSON values. Three backends are provided and
//! selected at startup through [`StateStore`]:
//!
//! ```text
//! StateStore
//!     |-- Memory    (InMemoryStore)  tests, throwaway runs
//!     |-- File      (FileStore)      one JSON file per key
//!     +-- Dragonfly (DragonflyStore) shared Redis-compatible instance
//! ```
//!
//! # Modules
//!
//! - [`store`] -- The [`KeyValueStore`] trait, keys and typed helpers
//! - [`memory`] -- Process-local backend
//! - [`file`] -- Local disk backend
//! - [`dragonfly`] -- `Dragonfly` backend
//! - [`error`] -- Shared error types

pub mod dragonfly;
pub mod error;
pub mod file;
pub mod memory;
pub mod store;

use std::path::Path;
use std::str::FromStr;

use serde_json::Value;

pub use dragonfly::DragonflyStore;
pub use error::DbError;
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use store::{
    IDENTITY_HINTS_KEY, KeyValueStore, MEMORY_KEY, REGISTRY_STATE_KEY, load_json, save_json,
};

/// Which backend holds saved state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// [`InMemoryStore`].
    Memory,
    /// [`FileStore`].
    File,
    /// [`DragonflyStore`].
    Dragonfly,
}

impl FromStr for StoreBackend {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "dragonfly" | "redis" => Ok(Self::Dragonfly),
            other => Err(DbError::Config(format!(
                "unknown state backend '{other}' (expected memory, file or dragonfly)"
            ))),
        }
    }
}

/// Enum dispatch over the available backends.
pub enum StateStore {
    /// Process-local.
    Memory(InMemoryStore),
    /// Local disk.
    File(FileStore),
    /// Shared `Dragonfly` instance.
    Dragonfly(DragonflyStore),
}

impl StateStore {
    /// Open the configured backend.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the directory cannot be created or the
    /// `Dragonfly` connection fails.
    pub async fn open(
        backend: StoreBackend,
        state_dir: &Path,
        dragonfly_url: &str,
    ) -> Result<Self, DbError> {
        match backend {
            StoreBackend::Memory => Ok(Self::Memory(InMemoryStore::new())),
            StoreBackend::File => Ok(Self::File(FileStore::open(state_dir).await?)),
            StoreBackend::Dragonfly => {
                Ok(Self::Dragonfly(DragonflyStore::connect(dragonfly_url).await?))
            }
        }
    }

    /// Human-readable backend name for logs.
    pub const fn backend_name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::File(_) => "file",
            Self::Dragonfly(_) => "dragonfly",
        }
    }
}

impl KeyValueStore for StateStore {
    async fn load(&self, key: &str) -> Result<Option<Value>, DbError> {
        match self {
            Self::Memory(store) => store.load(key).await,
            Self::File(store) => store.load(key).await,
            Self::Dragonfly(store) => store.load(key).await,
        }
    }

    async fn save(&self, key: &str, value: &Value) -> Result<(), DbError> {
        match self {
            Self::Memory(store) => store.save(key, value).await,
            Self::File(store) => store.save(key, value).await,
            Self::Dragonfly(store) => store.save(key, value).await,
        }
    }
}
