//! `Dragonfly` (Redis-compatible) blob store.
//!
//! Each key holds one JSON string. `Dragonfly` is the shared backend when
//! several processes (renderer bridge, runner) need the same saved state.

use fred::prelude::*;
use serde_json::Value;

use crate::error::DbError;
use crate::store::KeyValueStore;

/// Connection handle to a `Dragonfly` (Redis-compatible) instance.
#[derive(Clone)]
pub struct DragonflyStore {
    client: Client,
}

impl DragonflyStore {
    /// Open a client for `url` (`redis://host:port[/db]`).
    ///
    /// Fails with [`DbError::Config`] on a malformed URL and with
    /// [`DbError::Dragonfly`] when the server cannot be reached.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let config = Config::from_url(url)
            .map_err(|e| DbError::Config(format!("bad state store URL {url}: {e}")))?;
        let client = Builder::from_config(config).build()?;
        client.init().await?;
        tracing::info!(url, "state store connected");
        Ok(Self { client })
    }
}

impl KeyValueStore for DragonflyStore {
    async fn load(&self, key: &str) -> Result<Option<Value>, DbError> {
        let value: Option<String> = self.client.get(key).await?;
        value
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(DbError::from)
    }

    async fn save(&self, key: &str, value: &Value) -> Result<(), DbError> {
        let json = serde_json::to_string(value)?;
        let _: () = self.client.set(key, json.as_str(), None, None, false).await?;
        Ok(())
    }
}
