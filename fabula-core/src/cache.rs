//! Persistent choice cache.
//!
//! Generated choice lists are stored under `(node, attribute-bucket)`
//! keys so similar players reuse one another's generations. The backing
//! file is plain JSON, loaded once at startup and rewritten in full on
//! every store. The key space is bounded by
//! distinct nodes x 3 gender buckets x 4 age buckets, so there is no
//! eviction.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors from cache persistence.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistent key -> choice-list store.
///
/// Storage failures are never fatal: an unreadable file loads as an
/// empty cache and an unwritable file keeps entries in memory only,
/// each with a logged warning.
#[derive(Debug)]
pub struct ChoiceCache {
    entries: HashMap<String, Vec<String>>,
    path: PathBuf,
}

impl ChoiceCache {
    /// Load the cache from `path`.
    ///
    /// A missing file is a normal first run; a corrupt or unreadable
    /// file degrades to an empty cache.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(
                        "Could not parse choice cache {}: {e}; starting empty",
                        path.display()
                    );
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                tracing::warn!(
                    "Could not read choice cache {}: {e}; starting empty",
                    path.display()
                );
                HashMap::new()
            }
        };

        Self { entries, path }
    }

    /// Get cached choices for a key.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(|c| c.as_slice())
    }

    /// Store choices under a key, replacing any previous entry, and
    /// persist immediately (write-through).
    pub async fn set(&mut self, key: impl Into<String>, choices: Vec<String>) {
        self.entries.insert(key.into(), choices);
        if let Err(e) = self.save().await {
            tracing::warn!(
                "Could not save choice cache {}: {e}",
                self.path.display()
            );
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    async fn save(&self) -> Result<(), CacheError> {
        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn choices(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = TempDir::new().expect("temp dir");
        let cache = ChoiceCache::load(dir.path().join("cache.json")).await;
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let dir = TempDir::new().expect("temp dir");
        let mut cache = ChoiceCache::load(dir.path().join("cache.json")).await;

        cache
            .set("gate_female_adult", choices(&["Open it", "Knock", "Leave"]))
            .await;

        assert_eq!(
            cache.get("gate_female_adult"),
            Some(choices(&["Open it", "Knock", "Leave"]).as_slice())
        );
        assert_eq!(cache.get("gate_male_elder"), None);
    }

    #[tokio::test]
    async fn test_entries_survive_reload() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("cache.json");

        let mut cache = ChoiceCache::load(&path).await;
        cache.set("gate_male_young", choices(&["Run", "Hide"])).await;
        drop(cache);

        let reloaded = ChoiceCache::load(&path).await;
        assert_eq!(reloaded.len(), 1);
        assert_eq!(
            reloaded.get("gate_male_young"),
            Some(choices(&["Run", "Hide"]).as_slice())
        );
    }

    #[tokio::test]
    async fn test_set_overwrites_wholesale() {
        let dir = TempDir::new().expect("temp dir");
        let mut cache = ChoiceCache::load(dir.path().join("cache.json")).await;

        cache.set("gate_other_adult", choices(&["Old choice"])).await;
        cache
            .set("gate_other_adult", choices(&["New one", "New two"]))
            .await;

        assert_eq!(
            cache.get("gate_other_adult"),
            Some(choices(&["New one", "New two"]).as_slice())
        );
    }

    #[tokio::test]
    async fn test_corrupt_file_degrades_to_empty() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ not json").expect("write corrupt file");

        let cache = ChoiceCache::load(&path).await;
        assert!(cache.is_empty());
    }
}
