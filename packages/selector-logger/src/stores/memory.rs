//! In-memory key-value store.
//!
//! The fallback backend when no persistent store is wired in, and the
//! backend of choice in tests. Data is lost when the process exits.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreResult;
use crate::traits::kv::KvStore;

/// In-memory store over a locked map.
#[derive(Debug, Default)]
pub struct MemoryKv {
    records: RwLock<HashMap<String, Value>>,
}

impl MemoryKv {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every record.
    pub fn clear(&self) {
        self.records.write().unwrap().clear();
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.records.read().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        self.records.write().unwrap().insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn get_returns_what_set_stored() {
        let kv = MemoryKv::new();
        assert_eq!(kv.get("missing").await.unwrap(), None);

        kv.set("k", json!({"a": 1})).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), Some(json!({"a": 1})));

        kv.set("k", json!({"a": 2})).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), Some(json!({"a": 2})));
        assert_eq!(kv.len(), 1);
    }
}
