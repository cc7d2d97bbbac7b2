//! StorySession - the primary public API for running an adventure.
//!
//! Wires the story tree, the persistent stores and the storyteller into
//! a single facade for a presentation layer: construct it with a
//! protagonist, then alternate `story`/`choices`/`choose` and feed
//! ratings back through `record_feedback`. One session serves one
//! protagonist and one cursor.

use crate::cache::ChoiceCache;
use crate::feedback::{FeedbackError, FeedbackRecord, FeedbackStore};
use crate::protagonist::{resolve_variables, Protagonist};
use crate::storyteller::{ClaudeStoryteller, Storyteller, StorytellerConfig};
use crate::tree::{SelectOutcome, StorySeed, StoryTree, TreeError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// File name of the persisted choice cache, under the data directory.
pub const CHOICE_CACHE_FILE: &str = "choice_cache.json";

/// File name of the persisted feedback store, under the data directory.
pub const FEEDBACK_FILE: &str = "feedback.json";

/// Errors from session construction and use.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("story tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("feedback error: {0}")]
    Feedback(#[from] FeedbackError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for creating a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Directory holding the cache and feedback files.
    pub data_dir: PathBuf,

    /// Model override for the storyteller.
    pub model: Option<String>,

    /// Maximum tokens per generation.
    pub max_tokens: usize,

    /// Sampling temperature for generation.
    pub temperature: Option<f32>,
}

impl SessionConfig {
    /// Create a config with defaults, storing data under `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            model: None,
            max_tokens: 600,
            temperature: Some(0.8),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn storyteller_config(&self) -> StorytellerConfig {
        StorytellerConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// A running adventure for one protagonist.
pub struct StorySession {
    tree: StoryTree,
    protagonist: Protagonist,
}

impl StorySession {
    /// Create a session, building the storyteller from the environment.
    ///
    /// A missing `ANTHROPIC_API_KEY` is not an error: the session runs
    /// for its whole lifetime on authored, cached and fallback content,
    /// with a logged warning.
    pub async fn new(
        config: SessionConfig,
        protagonist: Protagonist,
    ) -> Result<Self, SessionError> {
        let storyteller: Option<Box<dyn Storyteller>> = match ClaudeStoryteller::from_env() {
            Ok(storyteller) => {
                Some(Box::new(storyteller.with_config(config.storyteller_config())))
            }
            Err(e) => {
                tracing::warn!("Storyteller unavailable, running degraded: {e}");
                None
            }
        };

        Self::with_storyteller(config, protagonist, storyteller).await
    }

    /// Create a session with an explicit storyteller, or none for a
    /// deliberately degraded session.
    pub async fn with_storyteller(
        config: SessionConfig,
        protagonist: Protagonist,
        storyteller: Option<Box<dyn Storyteller>>,
    ) -> Result<Self, SessionError> {
        fs::create_dir_all(&config.data_dir).await?;
        let cache = ChoiceCache::load(config.data_dir.join(CHOICE_CACHE_FILE)).await;
        let feedback = FeedbackStore::load(config.data_dir.join(FEEDBACK_FILE)).await;
        let tree = StoryTree::new(StorySeed::opening(), cache, feedback, storyteller)?;

        Ok(Self { tree, protagonist })
    }

    /// The current passage, with protagonist variables resolved.
    pub fn story(&self) -> String {
        resolve_variables(self.tree.current_story(), &self.protagonist)
    }

    /// Id of the node the cursor is on.
    pub fn current_node_id(&self) -> &str {
        self.tree.current_node_id()
    }

    /// Choices at the current node, in selection order.
    pub async fn choices(&mut self) -> Vec<String> {
        self.tree.available_choices(&self.protagonist).await
    }

    /// Apply the player's selection.
    pub async fn choose(&mut self, choice_index: usize) -> SelectOutcome {
        self.tree.select(choice_index, &self.protagonist).await
    }

    /// Record player feedback about the choice made at `node_id`.
    ///
    /// The record carries a protagonist snapshot for audit. Out-of-range
    /// ratings are rejected before anything is stored.
    pub async fn record_feedback(
        &mut self,
        node_id: &str,
        choice_index: usize,
        rating: u8,
        comment: &str,
    ) -> Result<(), FeedbackError> {
        let record = FeedbackRecord::new(node_id, choice_index, rating, comment)?
            .with_protagonist_context(self.protagonist.describe());
        self.tree.feedback_mut().add(record).await;
        Ok(())
    }

    pub fn protagonist(&self) -> &Protagonist {
        &self.protagonist
    }

    pub fn tree(&self) -> &StoryTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut StoryTree {
        &mut self.tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_protagonist;
    use tempfile::TempDir;

    #[test]
    fn test_session_config_builder() {
        let config = SessionConfig::new("/tmp/story")
            .with_model("claude-3-haiku")
            .with_max_tokens(300)
            .with_temperature(0.5);

        assert_eq!(config.data_dir, PathBuf::from("/tmp/story"));
        assert_eq!(config.model.as_deref(), Some("claude-3-haiku"));
        assert_eq!(config.max_tokens, 300);
        assert_eq!(config.temperature, Some(0.5));

        let storyteller_config = config.storyteller_config();
        assert_eq!(storyteller_config.max_tokens, 300);
    }

    #[tokio::test]
    async fn test_degraded_session_starts_at_opening() {
        let dir = TempDir::new().expect("temp dir");
        let config = SessionConfig::new(dir.path());

        let mut session =
            StorySession::with_storyteller(config, sample_protagonist(), None)
                .await
                .expect("session");

        assert_eq!(session.current_node_id(), "awakening");
        assert!(!session.story().is_empty());
        assert_eq!(session.choices().await.len(), 2);
    }

    #[tokio::test]
    async fn test_record_feedback_rejects_bad_rating() {
        let dir = TempDir::new().expect("temp dir");
        let mut session = StorySession::with_storyteller(
            SessionConfig::new(dir.path()),
            sample_protagonist(),
            None,
        )
        .await
        .expect("session");

        let result = session.record_feedback("awakening", 0, 9, "too good").await;
        assert!(matches!(result, Err(FeedbackError::InvalidRating(9))));
        assert!(session.tree().feedback().is_empty());

        session
            .record_feedback("awakening", 0, 4, "lovely")
            .await
            .expect("valid rating");
        assert_eq!(session.tree().feedback().len(), 1);

        let stored = &session.tree().feedback().records_for("awakening")[0];
        assert!(stored
            .protagonist_context
            .as_deref()
            .is_some_and(|c| c.contains("Aria")));
    }
}
