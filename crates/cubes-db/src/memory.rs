//! Process-local store. Nothing survives a restart.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde_json::Value;

use crate::error::DbError;
use crate::store::KeyValueStore;

/// Blobs kept in a map behind a mutex.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    blobs: Mutex<BTreeMap<String, Value>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub const fn new() -> Self {
        Self {
            blobs: Mutex::new(BTreeMap::new()),
        }
    }

    /// Keys currently held.
    pub fn keys(&self) -> Vec<String> {
        self.blobs
            .lock()
            .map(|blobs| blobs.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl KeyValueStore for InMemoryStore {
    async fn load(&self, key: &str) -> Result<Option<Value>, DbError> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|_poisoned| DbError::Config("in-memory store lock poisoned".to_owned()))?;
        Ok(blobs.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &Value) -> Result<(), DbError> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_poisoned| DbError::Config("in-memory store lock poisoned".to_owned()))?;
        blobs.insert(key.to_owned(), value.clone());
        Ok(())
    }
}
