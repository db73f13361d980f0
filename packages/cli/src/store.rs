//! File-backed key-value store.
//!
//! One JSON object per file, keys at the top level. This is the persistent
//! backend the CLI hands to the session store so state survives across
//! invocations.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use selector_logger::error::{StoreError, StoreResult};
use selector_logger::KvStore;

pub struct JsonFileKv {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl JsonFileKv {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> StoreResult<Map<String, Value>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let value: Value = serde_json::from_slice(&bytes)?;
                match value {
                    Value::Object(map) => Ok(map),
                    _ => Ok(Map::new()),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(StoreError::Backend(Box::new(e))),
        }
    }

    async fn save(&self, map: &Map<String, Value>) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(&Value::Object(map.clone()))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StoreError::Backend(Box::new(e)))?;
            }
        }
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| StoreError::Backend(Box::new(e)))
    }
}

#[async_trait]
impl KvStore for JsonFileKv {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;
        map.insert(key.to_string(), value);
        self.save(&map).await
    }
}
