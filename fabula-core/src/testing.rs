//! Testing utilities.
//!
//! `MockStoryteller` scripts the generation port so orchestration paths
//! can be exercised deterministically, without network access. Queue
//! responses in the order calls will consume them; an exhausted queue
//! behaves like a failed generation, which is exactly what callers must
//! tolerate anyway.

use crate::feedback::FeedbackSummary;
use crate::protagonist::{Protagonist, STARTING_SITUATIONS};
use crate::storyteller::{ExpansionSuggestion, Storyteller, StorytellerError};
use async_trait::async_trait;
use std::sync::Mutex;

/// A protagonist with unremarkable attributes, for tests.
pub fn sample_protagonist() -> Protagonist {
    Protagonist::new("Aria", "female", 29, STARTING_SITUATIONS[1])
}

#[derive(Debug, Default)]
struct MockState {
    choices: Vec<Vec<String>>,
    analyses: Vec<ExpansionSuggestion>,
    continuations: Vec<String>,
    choice_calls: usize,
    analyze_calls: usize,
    continue_calls: usize,
}

/// A scripted storyteller.
#[derive(Debug, Default)]
pub struct MockStoryteller {
    state: Mutex<MockState>,
    fail_all: bool,
}

impl MockStoryteller {
    /// A mock with empty queues: every call counts, then fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock whose every operation fails, queues notwithstanding.
    pub fn failing() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            fail_all: true,
        }
    }

    /// Queue a choice list for the next `propose_choices` call.
    pub fn with_choices(self, choices: &[&str]) -> Self {
        self.state
            .lock()
            .expect("mock state lock")
            .choices
            .push(choices.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Queue a suggestion for the next `analyze_feedback` call.
    pub fn with_analysis(self, suggestion: ExpansionSuggestion) -> Self {
        self.state
            .lock()
            .expect("mock state lock")
            .analyses
            .push(suggestion);
        self
    }

    /// Queue narrative text for the next `continue_story` call.
    pub fn with_continuation(self, text: &str) -> Self {
        self.state
            .lock()
            .expect("mock state lock")
            .continuations
            .push(text.to_string());
        self
    }

    /// How many times `propose_choices` was called.
    pub fn choice_calls(&self) -> usize {
        self.state.lock().expect("mock state lock").choice_calls
    }

    /// How many times `analyze_feedback` was called.
    pub fn analyze_calls(&self) -> usize {
        self.state.lock().expect("mock state lock").analyze_calls
    }

    /// How many times `continue_story` was called.
    pub fn continue_calls(&self) -> usize {
        self.state.lock().expect("mock state lock").continue_calls
    }

    fn scripted_failure() -> StorytellerError {
        StorytellerError::EmptyResponse("scripted failure".to_string())
    }
}

#[async_trait]
impl Storyteller for MockStoryteller {
    async fn propose_choices(
        &self,
        _story_context: &str,
        _protagonist: &Protagonist,
    ) -> Result<Vec<String>, StorytellerError> {
        let mut state = self.state.lock().expect("mock state lock");
        state.choice_calls += 1;
        if self.fail_all || state.choices.is_empty() {
            return Err(Self::scripted_failure());
        }
        Ok(state.choices.remove(0))
    }

    async fn analyze_feedback(
        &self,
        _story_context: &str,
        _summary: &FeedbackSummary,
    ) -> Result<ExpansionSuggestion, StorytellerError> {
        let mut state = self.state.lock().expect("mock state lock");
        state.analyze_calls += 1;
        if self.fail_all || state.analyses.is_empty() {
            return Err(Self::scripted_failure());
        }
        Ok(state.analyses.remove(0))
    }

    async fn continue_story(
        &self,
        _story_context: &str,
        _protagonist: &Protagonist,
        _suggestion: &ExpansionSuggestion,
    ) -> Result<String, StorytellerError> {
        let mut state = self.state.lock().expect("mock state lock");
        state.continue_calls += 1;
        if self.fail_all || state.continuations.is_empty() {
            return Err(Self::scripted_failure());
        }
        Ok(state.continuations.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_pops_queued_responses_in_order() {
        let mock = MockStoryteller::new()
            .with_choices(&["First", "Second", "Third"])
            .with_continuation("Onward.");
        let protagonist = sample_protagonist();

        let choices = mock
            .propose_choices("context", &protagonist)
            .await
            .expect("scripted choices");
        assert_eq!(choices, vec!["First", "Second", "Third"]);

        // Queue exhausted: the next call fails like a real outage.
        assert!(mock.propose_choices("context", &protagonist).await.is_err());
        assert_eq!(mock.choice_calls(), 2);

        let text = mock
            .continue_story("context", &protagonist, &ExpansionSuggestion::default())
            .await
            .expect("scripted continuation");
        assert_eq!(text, "Onward.");
    }

    #[tokio::test]
    async fn test_failing_mock_fails_everything() {
        let mock = MockStoryteller::failing().with_choices(&["Never seen"]);
        let protagonist = sample_protagonist();

        assert!(mock.propose_choices("context", &protagonist).await.is_err());
        assert!(mock
            .analyze_feedback("context", &FeedbackSummary::default())
            .await
            .is_err());
    }
}
