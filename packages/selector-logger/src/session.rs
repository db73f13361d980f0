//! Session state: config record, visited-URL dedup set, bounded log.
//!
//! Everything is reconciled through the external key-value store; records
//! are read and written whole. Concurrent triggers can interleave
//! read-modify-write cycles on the visited set, so dedup is best effort,
//! not linearizable.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::normalize::normalize_url;
use crate::rules::CollectorRow;
use crate::traits::kv::KvStore;

/// Log lines kept after truncation; oldest evicted first.
pub const MAX_LOG_LINES: usize = 5000;

/// Key for the whole-record config state.
pub const STATE_KEY: &str = "selectorLoggerState";

/// Key for the session-scoped visited-URL record.
pub const VISITED_KEY: &str = "selectorLoggerVisited";

/// Key for the session-scoped bounded log record.
pub const LOG_KEY: &str = "selectorLoggerLog";

/// The user-owned configuration record.
///
/// Written wholesale by the control surface on every edit; the background
/// controller only reads it. Field names match the persisted JSON shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigState {
    /// Run collectors autonomously on page-load completion
    pub auto_run: bool,

    /// Ordered collector rows
    pub rows: Vec<CollectorRow>,

    /// Forward collected lines to the native host
    pub enable_native: bool,

    /// Target path the host appends to
    pub file_path: String,

    /// Consult and update the visited set on autonomous runs
    pub skip_visited: bool,
}

impl Default for ConfigState {
    fn default() -> Self {
        Self {
            auto_run: false,
            rows: Vec::new(),
            enable_native: false,
            file_path: String::new(),
            skip_visited: true,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct VisitedRecord {
    urls: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LogRecord {
    lines: Vec<String>,
}

/// Session state store over a key-value backend.
pub struct SessionStore<K> {
    kv: K,
}

impl<K: KvStore> SessionStore<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    async fn read<T: DeserializeOwned + Default>(&self, key: &str) -> StoreResult<T> {
        match self.kv.get(key).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(T::default()),
        }
    }

    async fn write<T: Serialize>(&self, key: &str, record: &T) -> StoreResult<()> {
        self.kv.set(key, serde_json::to_value(record)?).await
    }

    /// Read the config record, defaults on first read.
    pub async fn state(&self) -> StoreResult<ConfigState> {
        self.read(STATE_KEY).await
    }

    /// Overwrite the config record wholesale. Callers changing one field
    /// must merge into a freshly read record first.
    pub async fn set_state(&self, state: &ConfigState) -> StoreResult<()> {
        self.write(STATE_KEY, state).await
    }

    /// Rehydrate the visited set. Serialized as an array; duplicates in a
    /// stored record collapse here.
    pub async fn visited(&self) -> StoreResult<HashSet<String>> {
        let record: VisitedRecord = self.read(VISITED_KEY).await?;
        Ok(record.urls.into_iter().collect())
    }

    /// Write the visited set back. Part of a read-modify-write cycle; a
    /// concurrent writer can win the race and drop this update.
    pub async fn set_visited(&self, urls: &HashSet<String>) -> StoreResult<()> {
        let mut urls: Vec<String> = urls.iter().cloned().collect();
        urls.sort();
        self.write(VISITED_KEY, &VisitedRecord { urls }).await
    }

    /// Membership test under the mandatory normalization.
    pub async fn has_visited(&self, raw_url: &str) -> StoreResult<bool> {
        Ok(self.visited().await?.contains(&normalize_url(raw_url)))
    }

    /// Current log lines, oldest first.
    pub async fn log(&self) -> StoreResult<Vec<String>> {
        let record: LogRecord = self.read(LOG_KEY).await?;
        Ok(record.lines)
    }

    /// Append lines in order, keeping only the newest [`MAX_LOG_LINES`].
    pub async fn append_log(&self, lines: &[String]) -> StoreResult<()> {
        let mut record: LogRecord = self.read(LOG_KEY).await?;
        record.lines.extend_from_slice(lines);
        if record.lines.len() > MAX_LOG_LINES {
            let excess = record.lines.len() - MAX_LOG_LINES;
            record.lines.drain(..excess);
        }
        self.write(LOG_KEY, &record).await
    }

    /// Reset the log to empty.
    pub async fn clear_log(&self) -> StoreResult<()> {
        self.write(LOG_KEY, &LogRecord::default()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::memory::MemoryKv;

    fn store() -> SessionStore<MemoryKv> {
        SessionStore::new(MemoryKv::new())
    }

    #[tokio::test]
    async fn state_defaults_on_first_read() {
        let store = store();
        let state = store.state().await.unwrap();
        assert_eq!(state, ConfigState::default());
        assert!(state.skip_visited);
    }

    #[tokio::test]
    async fn state_round_trips_wholesale() {
        let store = store();
        let state = ConfigState {
            auto_run: true,
            rows: vec![CollectorRow::new(".a|inner")],
            enable_native: true,
            file_path: "/tmp/out.log".to_string(),
            skip_visited: false,
        };
        store.set_state(&state).await.unwrap();
        assert_eq!(store.state().await.unwrap(), state);
    }

    #[tokio::test]
    async fn state_record_uses_original_field_names() {
        let store = store();
        store.set_state(&ConfigState::default()).await.unwrap();
        let raw = store.kv.get(STATE_KEY).await.unwrap().unwrap();
        assert!(raw.get("autoRun").is_some());
        assert!(raw.get("enableNative").is_some());
        assert!(raw.get("filePath").is_some());
        assert!(raw.get("skipVisited").is_some());
    }

    #[tokio::test]
    async fn visited_set_round_trips_and_dedups() {
        let store = store();
        let mut urls = HashSet::new();
        urls.insert("https://x.com/a".to_string());
        urls.insert("https://x.com/b".to_string());
        store.set_visited(&urls).await.unwrap();

        let read = store.visited().await.unwrap();
        assert_eq!(read, urls);

        // Idempotent: re-adding an existing member changes nothing
        let mut again = read.clone();
        again.insert("https://x.com/a".to_string());
        store.set_visited(&again).await.unwrap();
        assert_eq!(store.visited().await.unwrap(), urls);
    }

    #[tokio::test]
    async fn membership_is_normalization_invariant() {
        let store = store();
        let mut urls = HashSet::new();
        urls.insert(normalize_url("https://x.com/p/"));
        store.set_visited(&urls).await.unwrap();
        assert!(store.has_visited("https://x.com/p").await.unwrap());
        assert!(store.has_visited("https://x.com/p#frag").await.unwrap());
        assert!(!store.has_visited("https://x.com/q").await.unwrap());
    }

    #[tokio::test]
    async fn log_appends_in_order() {
        let store = store();
        store
            .append_log(&["one".to_string(), "two".to_string()])
            .await
            .unwrap();
        store.append_log(&["three".to_string()]).await.unwrap();
        assert_eq!(store.log().await.unwrap(), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn log_evicts_oldest_first() {
        let store = store();
        let lines: Vec<String> = (0..MAX_LOG_LINES + 7).map(|i| format!("line {i}")).collect();
        store.append_log(&lines).await.unwrap();

        let kept = store.log().await.unwrap();
        assert_eq!(kept.len(), MAX_LOG_LINES);
        assert_eq!(kept.first().unwrap(), "line 7");
        assert_eq!(kept.last().unwrap(), &format!("line {}", MAX_LOG_LINES + 6));
    }

    #[tokio::test]
    async fn clear_log_empties_the_record() {
        let store = store();
        store.append_log(&["one".to_string()]).await.unwrap();
        store.clear_log().await.unwrap();
        assert!(store.log().await.unwrap().is_empty());
    }
}
