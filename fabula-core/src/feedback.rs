//! Player feedback storage and the expansion eligibility gate.
//!
//! Feedback records append under the node where the choice was made and
//! persist immediately. Summaries are computed on demand; per-node
//! volume stays small enough that a linear scan is fine. A node becomes
//! an expansion candidate only when it clears both the volume gate and
//! the quality gate: a handful of ratings alone, or one rave review
//! alone, is not a signal worth growing the tree for.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Minimum number of records before a node can expand.
pub const MIN_FEEDBACK_COUNT: usize = 3;

/// Minimum average rating before a node can expand.
pub const MIN_AVERAGE_RATING: f64 = 3.5;

/// How many recent records a summary carries.
const SUMMARY_RECENT_LIMIT: usize = 5;

/// Errors from feedback validation and persistence.
#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("rating {0} is out of range, expected 1-5")]
    InvalidRating(u8),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single piece of player feedback about a choice made at a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub node_id: String,

    /// Zero-based index of the choice taken at the node.
    pub choice_index: usize,

    /// Rating in 1..=5, validated at construction.
    pub rating: u8,

    pub comment: String,

    pub timestamp: DateTime<Utc>,

    /// Free-text protagonist snapshot for audit; not used structurally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protagonist_context: Option<String>,
}

impl FeedbackRecord {
    /// Create a record stamped with the current time.
    ///
    /// Out-of-range ratings are rejected before anything reaches the
    /// store.
    pub fn new(
        node_id: impl Into<String>,
        choice_index: usize,
        rating: u8,
        comment: impl Into<String>,
    ) -> Result<Self, FeedbackError> {
        if !(1..=5).contains(&rating) {
            return Err(FeedbackError::InvalidRating(rating));
        }

        Ok(Self {
            node_id: node_id.into(),
            choice_index,
            rating,
            comment: comment.into(),
            timestamp: Utc::now(),
            protagonist_context: None,
        })
    }

    /// Attach a protagonist snapshot for auditing.
    pub fn with_protagonist_context(mut self, context: impl Into<String>) -> Self {
        self.protagonist_context = Some(context.into());
        self
    }
}

/// Derived statistics over a node's accumulated feedback.
///
/// Computed on demand, never stored.
#[derive(Debug, Clone, Default)]
pub struct FeedbackSummary {
    pub count: usize,

    /// Arithmetic mean of ratings; 0.0 when there are no records.
    pub average_rating: f64,

    /// Non-empty comments, oldest first.
    pub comments: Vec<String>,

    /// Up to five most recent records, oldest first.
    pub recent: Vec<FeedbackRecord>,
}

/// Persistent multi-map from node id to feedback records.
#[derive(Debug)]
pub struct FeedbackStore {
    records: HashMap<String, Vec<FeedbackRecord>>,
    path: PathBuf,
}

impl FeedbackStore {
    /// Load the store from `path`; missing or corrupt files degrade to
    /// an empty store with a logged warning.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let records = match fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(
                        "Could not parse feedback file {}: {e}; starting empty",
                        path.display()
                    );
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                tracing::warn!(
                    "Could not read feedback file {}: {e}; starting empty",
                    path.display()
                );
                HashMap::new()
            }
        };

        Self { records, path }
    }

    /// Append a record under its node and persist immediately.
    pub async fn add(&mut self, record: FeedbackRecord) {
        self.records
            .entry(record.node_id.clone())
            .or_default()
            .push(record);

        if let Err(e) = self.save().await {
            tracing::warn!(
                "Could not save feedback file {}: {e}",
                self.path.display()
            );
        }
    }

    /// Records for a node, in insertion order.
    pub fn records_for(&self, node_id: &str) -> &[FeedbackRecord] {
        self.records.get(node_id).map(|r| r.as_slice()).unwrap_or(&[])
    }

    /// Compute summary statistics for a node.
    pub fn summary_for(&self, node_id: &str) -> FeedbackSummary {
        let records = self.records_for(node_id);
        if records.is_empty() {
            return FeedbackSummary::default();
        }

        let count = records.len();
        let total: u32 = records.iter().map(|r| u32::from(r.rating)).sum();
        let average_rating = f64::from(total) / count as f64;

        let comments = records
            .iter()
            .filter(|r| !r.comment.trim().is_empty())
            .map(|r| r.comment.clone())
            .collect();

        let recent = records
            .iter()
            .skip(count.saturating_sub(SUMMARY_RECENT_LIMIT))
            .cloned()
            .collect();

        FeedbackSummary {
            count,
            average_rating,
            comments,
            recent,
        }
    }

    /// Node ids that clear both expansion gates: at least `min_count`
    /// records AND an average rating of at least `min_avg_rating`.
    ///
    /// Returned sorted for deterministic scanning.
    pub fn nodes_eligible_for_expansion(
        &self,
        min_count: usize,
        min_avg_rating: f64,
    ) -> Vec<String> {
        let mut eligible: Vec<String> = self
            .records
            .keys()
            .filter(|node_id| {
                let summary = self.summary_for(node_id);
                summary.count >= min_count && summary.average_rating >= min_avg_rating
            })
            .cloned()
            .collect();

        eligible.sort();
        eligible
    }

    /// Total records across all nodes.
    pub fn len(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    async fn save(&self) -> Result<(), FeedbackError> {
        let content = serde_json::to_string_pretty(&self.records)?;
        fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store(dir: &TempDir) -> FeedbackStore {
        FeedbackStore::load(dir.path().join("feedback.json")).await
    }

    fn record(node_id: &str, rating: u8, comment: &str) -> FeedbackRecord {
        FeedbackRecord::new(node_id, 0, rating, comment).expect("valid rating")
    }

    #[test]
    fn test_rating_validation() {
        assert!(FeedbackRecord::new("gate", 0, 1, "").is_ok());
        assert!(FeedbackRecord::new("gate", 0, 5, "").is_ok());
        assert!(matches!(
            FeedbackRecord::new("gate", 0, 0, ""),
            Err(FeedbackError::InvalidRating(0))
        ));
        assert!(matches!(
            FeedbackRecord::new("gate", 0, 6, ""),
            Err(FeedbackError::InvalidRating(6))
        ));
    }

    #[test]
    fn test_record_round_trip() {
        let original = record("gate", 4, "loved the lantern")
            .with_protagonist_context("Aria (female, 29) - a wanderer");

        let json = serde_json::to_string(&original).expect("serialize");
        let decoded: FeedbackRecord = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(decoded, original);
    }

    #[tokio::test]
    async fn test_empty_summary() {
        let dir = TempDir::new().expect("temp dir");
        let store = store(&dir).await;

        let summary = store.summary_for("nowhere");
        assert_eq!(summary.count, 0);
        assert_eq!(summary.average_rating, 0.0);
        assert!(summary.comments.is_empty());
        assert!(summary.recent.is_empty());
    }

    #[tokio::test]
    async fn test_summary_statistics() {
        let dir = TempDir::new().expect("temp dir");
        let mut store = store(&dir).await;

        store.add(record("gate", 5, "great")).await;
        store.add(record("gate", 4, "")).await;
        store.add(record("gate", 3, "   ")).await;
        store.add(record("gate", 4, "more like this")).await;

        let summary = store.summary_for("gate");
        assert_eq!(summary.count, 4);
        assert!((summary.average_rating - 4.0).abs() < f64::EPSILON);
        assert_eq!(summary.comments, vec!["great", "more like this"]);
        assert_eq!(summary.recent.len(), 4);
    }

    #[tokio::test]
    async fn test_summary_recent_caps_at_five() {
        let dir = TempDir::new().expect("temp dir");
        let mut store = store(&dir).await;

        for i in 0..7 {
            store.add(record("gate", 3, &format!("comment {i}"))).await;
        }

        let summary = store.summary_for("gate");
        assert_eq!(summary.count, 7);
        assert_eq!(summary.recent.len(), 5);
        assert_eq!(summary.recent[0].comment, "comment 2");
        assert_eq!(summary.recent[4].comment, "comment 6");
    }

    #[tokio::test]
    async fn test_expansion_gates() {
        let dir = TempDir::new().expect("temp dir");
        let mut store = store(&dir).await;

        // Two rave reviews: volume gate fails.
        store.add(record("few", 5, "")).await;
        store.add(record("few", 5, "")).await;

        // Five lukewarm reviews: quality gate fails.
        for _ in 0..5 {
            store.add(record("lukewarm", 3, "")).await;
        }

        // Three good reviews: both gates pass.
        for _ in 0..3 {
            store.add(record("strong", 4, "")).await;
        }

        let eligible =
            store.nodes_eligible_for_expansion(MIN_FEEDBACK_COUNT, MIN_AVERAGE_RATING);
        assert_eq!(eligible, vec!["strong".to_string()]);
    }

    #[tokio::test]
    async fn test_records_survive_reload() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("feedback.json");

        let mut store = FeedbackStore::load(&path).await;
        store.add(record("gate", 4, "nice")).await;
        store.add(record("stair", 2, "")).await;
        drop(store);

        let reloaded = FeedbackStore::load(&path).await;
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.records_for("gate").len(), 1);
        assert_eq!(reloaded.records_for("gate")[0].comment, "nice");
    }

    #[tokio::test]
    async fn test_corrupt_file_degrades_to_empty() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("feedback.json");
        std::fs::write(&path, "[not, a, map]").expect("write corrupt file");

        let store = FeedbackStore::load(&path).await;
        assert!(store.is_empty());
    }
}
