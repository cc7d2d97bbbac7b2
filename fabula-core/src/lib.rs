//! Adaptive branching-narrative engine.
//!
//! This crate drives a story tree that a customized protagonist walks:
//! - Authored nodes come first; their children are the choices.
//! - Childless nodes draw choices from a persistent cache keyed by
//!   coarse protagonist attributes, then from the storyteller, then
//!   from a static fallback pool.
//! - Terminal nodes grow new branches out of accumulated player
//!   feedback, so the tree adapts over its lifetime.
//!
//! # Quick Start
//!
//! ```ignore
//! use fabula_core::{Protagonist, SessionConfig, StorySession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let protagonist = Protagonist::new(
//!         "Aria",
//!         "female",
//!         29,
//!         "A scholar who stumbled into a magical realm",
//!     );
//!     let mut session =
//!         StorySession::new(SessionConfig::new("."), protagonist).await?;
//!
//!     println!("{}", session.story());
//!     for (i, choice) in session.choices().await.iter().enumerate() {
//!         println!("{}. {choice}", i + 1);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod feedback;
pub mod protagonist;
pub mod session;
pub mod storyteller;
pub mod template;
pub mod testing;
pub mod tree;

// Primary public API
pub use cache::ChoiceCache;
pub use feedback::{
    FeedbackError, FeedbackRecord, FeedbackStore, FeedbackSummary, MIN_AVERAGE_RATING,
    MIN_FEEDBACK_COUNT,
};
pub use protagonist::{
    bucket, cache_key, resolve_variables, variables, AgeBucket, GenderBucket, Protagonist,
    STARTING_SITUATIONS,
};
pub use session::{SessionConfig, SessionError, StorySession};
pub use storyteller::{
    ClaudeStoryteller, ExpansionSuggestion, Storyteller, StorytellerConfig, StorytellerError,
};
pub use template::{CustomVariable, StoryTemplate, TemplateError, TemplateLibrary, VariableKind};
pub use tree::{SelectOutcome, SeedNode, StoryNode, StorySeed, StoryTree, TreeError};
