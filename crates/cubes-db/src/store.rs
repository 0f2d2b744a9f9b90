//! The key-value persistence interface and its typed helpers.
//!
//! State is saved as whole JSON blobs under a handful of fixed keys:
//!
//! | Key | Contents |
//! |-----|----------|
//! | `cubes:memory` | Memory-by-agent map |
//! | `cubes:identity-hints` | Identity hint counter per agent |
//! | `cubes:registry-state` | Dynamic registry state per agent |

use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::DbError;

/// Key holding every cube's memory.
pub const MEMORY_KEY: &str = "cubes:memory";

/// Key holding identity hint counters.
pub const IDENTITY_HINTS_KEY: &str = "cubes:identity-hints";

/// Key holding dynamic registry state.
pub const REGISTRY_STATE_KEY: &str = "cubes:registry-state";

/// Blob store addressed by string keys.
pub trait KeyValueStore: Send + Sync {
    /// Read the blob at `key`, or `None` if nothing was saved there.
    fn load(&self, key: &str) -> impl Future<Output = Result<Option<Value>, DbError>> + Send;

    /// Replace the blob at `key`.
    fn save(&self, key: &str, value: &Value) -> impl Future<Output = Result<(), DbError>> + Send;
}

/// Load and deserialize the blob at `key`.
///
/// # Errors
///
/// Returns [`DbError::Serialization`] if the blob does not match `T`, or
/// any error from the backend.
pub async fn load_json<T: DeserializeOwned>(
    store: &impl KeyValueStore,
    key: &str,
) -> Result<Option<T>, DbError> {
    match store.load(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Serialize `value` and save it at `key`.
///
/// # Errors
///
/// Returns [`DbError::Serialization`] if `value` cannot be serialized, or
/// any error from the backend.
pub async fn save_json<T: Serialize + Sync>(
    store: &impl KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), DbError> {
    let blob = serde_json::to_value(value)?;
    store.save(key, &blob).await
}
