//! The persistent key-value store collaborator.
//!
//! The session state store does not own persistence; it talks to whatever
//! backing store is handed in through this trait. Values are opaque JSON
//! records, read and written whole.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreResult;

/// Get/set by key against the backing store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read the record under `key`, if any.
    async fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    /// Overwrite the record under `key`.
    async fn set(&self, key: &str, value: Value) -> StoreResult<()>;
}

// Shared handles delegate, so one backend can serve several contexts.
#[async_trait]
impl<T: KvStore + ?Sized> KvStore for Arc<T> {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        (**self).set(key, value).await
    }
}
