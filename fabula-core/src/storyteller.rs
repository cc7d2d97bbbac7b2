//! The storyteller port: narrative generation behind an explicit seam.
//!
//! The tree depends on this trait rather than on a concrete client, so
//! tests can script it and the game keeps running when no backend is
//! configured. Every operation can fail; callers treat a failure as "no
//! result from this source" and fall back, never as a fatal error.

use crate::feedback::FeedbackSummary;
use crate::protagonist::Protagonist;
use async_trait::async_trait;
use thiserror::Error;

/// Errors from storyteller operations.
#[derive(Debug, Error)]
pub enum StorytellerError {
    #[error("Claude API error: {0}")]
    Api(#[from] claude::Error),

    #[error("unusable response: {0}")]
    EmptyResponse(String),
}

/// Analysis distilled from a node's accumulated feedback.
///
/// Ephemeral: produced per expansion attempt and never stored. The
/// summary's count and average ride along so the caller can re-check
/// the quality gate against exactly the state that was analyzed.
#[derive(Debug, Clone, Default)]
pub struct ExpansionSuggestion {
    pub themes: Vec<String>,
    pub improvements: Vec<String>,
    pub expansion_ideas: Vec<String>,
    pub count: usize,
    pub average_rating: f64,
}

/// Capability to generate narrative content.
#[async_trait]
pub trait Storyteller: Send + Sync {
    /// Propose exactly three short choices for the current situation.
    ///
    /// A response with no parseable choice line is an error.
    async fn propose_choices(
        &self,
        story_context: &str,
        protagonist: &Protagonist,
    ) -> Result<Vec<String>, StorytellerError>;

    /// Distill accumulated feedback into themes, improvements and
    /// expansion ideas. Only invoked with `summary.count >= 2`.
    async fn analyze_feedback(
        &self,
        story_context: &str,
        summary: &FeedbackSummary,
    ) -> Result<ExpansionSuggestion, StorytellerError>;

    /// Produce the narrative text for a new child node.
    async fn continue_story(
        &self,
        story_context: &str,
        protagonist: &Protagonist,
        suggestion: &ExpansionSuggestion,
    ) -> Result<String, StorytellerError>;
}

/// Forwarding impl so a shared storyteller handle can stand in for an
/// owned one.
#[async_trait]
impl<T: Storyteller + ?Sized> Storyteller for std::sync::Arc<T> {
    async fn propose_choices(
        &self,
        story_context: &str,
        protagonist: &Protagonist,
    ) -> Result<Vec<String>, StorytellerError> {
        (**self).propose_choices(story_context, protagonist).await
    }

    async fn analyze_feedback(
        &self,
        story_context: &str,
        summary: &FeedbackSummary,
    ) -> Result<ExpansionSuggestion, StorytellerError> {
        (**self).analyze_feedback(story_context, summary).await
    }

    async fn continue_story(
        &self,
        story_context: &str,
        protagonist: &Protagonist,
        suggestion: &ExpansionSuggestion,
    ) -> Result<String, StorytellerError> {
        (**self)
            .continue_story(story_context, protagonist, suggestion)
            .await
    }
}

/// Configuration for the Claude-backed storyteller.
#[derive(Debug, Clone)]
pub struct StorytellerConfig {
    /// Model override; the client default applies when unset.
    pub model: Option<String>,

    /// Maximum tokens per generation.
    pub max_tokens: usize,

    /// Sampling temperature.
    pub temperature: Option<f32>,
}

impl Default for StorytellerConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 600,
            temperature: Some(0.8),
        }
    }
}

/// Storyteller backed by the Claude Messages API.
pub struct ClaudeStoryteller {
    client: claude::Claude,
    config: StorytellerConfig,
}

impl ClaudeStoryteller {
    /// Create a storyteller with an explicit API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: claude::Claude::new(api_key),
            config: StorytellerConfig::default(),
        }
    }

    /// Create a storyteller from the ANTHROPIC_API_KEY environment
    /// variable. This is the one-time availability check: a missing key
    /// fails here, and the caller runs in degraded mode for the rest of
    /// the session rather than retrying per call.
    pub fn from_env() -> Result<Self, StorytellerError> {
        let client = claude::Claude::from_env()?;
        Ok(Self {
            client,
            config: StorytellerConfig::default(),
        })
    }

    /// Configure generation parameters.
    pub fn with_config(mut self, config: StorytellerConfig) -> Self {
        self.config = config;
        self
    }

    fn request(&self, prompt: String) -> claude::Request {
        let mut request = claude::Request::prompt(prompt)
            .with_max_tokens(self.config.max_tokens);
        if let Some(ref model) = self.config.model {
            request = request.with_model(model);
        }
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }
        request
    }
}

#[async_trait]
impl Storyteller for ClaudeStoryteller {
    async fn propose_choices(
        &self,
        story_context: &str,
        protagonist: &Protagonist,
    ) -> Result<Vec<String>, StorytellerError> {
        let prompt = format!(
            "You are offering choices in a branching text adventure.\n\n\
             Current passage: {story_context}\n\n\
             Protagonist: {}\n\n\
             Write exactly 3 distinct choices that move the story forward,\n\
             fit the protagonist's background, and differ in approach\n\
             (bold, careful, inventive). Each choice is 6-12 words.\n\
             Return only the choices, one per line, with no numbering.",
            protagonist.describe()
        );

        let response = self.client.complete(self.request(prompt)).await?;
        let mut choices = parse_choice_lines(&response.text);
        if choices.is_empty() {
            return Err(StorytellerError::EmptyResponse(
                "no choice lines in response".to_string(),
            ));
        }

        choices.truncate(3);
        Ok(choices)
    }

    async fn analyze_feedback(
        &self,
        story_context: &str,
        summary: &FeedbackSummary,
    ) -> Result<ExpansionSuggestion, StorytellerError> {
        let mut prompt = format!(
            "You are reviewing player feedback on one passage of a\n\
             branching text adventure.\n\n\
             Passage: {story_context}\n\n\
             {} ratings, average {:.1} out of 5.\n",
            summary.count, summary.average_rating
        );
        if !summary.comments.is_empty() {
            prompt.push_str("Player comments:\n");
            for comment in &summary.comments {
                prompt.push_str(&format!("- {comment}\n"));
            }
        }
        prompt.push_str(
            "\nDistill what players responded to and how the story should\n\
             grow here. Answer in exactly this form, with short phrases:\n\
             THEMES:\n- ...\nIMPROVEMENTS:\n- ...\nEXPANSIONS:\n- ...",
        );

        let response = self.client.complete(self.request(prompt)).await?;
        let (themes, improvements, expansion_ideas) = parse_analysis(&response.text);
        if themes.is_empty() && improvements.is_empty() && expansion_ideas.is_empty() {
            return Err(StorytellerError::EmptyResponse(
                "no analysis sections in response".to_string(),
            ));
        }

        Ok(ExpansionSuggestion {
            themes,
            improvements,
            expansion_ideas,
            count: summary.count,
            average_rating: summary.average_rating,
        })
    }

    async fn continue_story(
        &self,
        story_context: &str,
        protagonist: &Protagonist,
        suggestion: &ExpansionSuggestion,
    ) -> Result<String, StorytellerError> {
        let mut prompt = format!(
            "You are writing the next passage of a branching text\n\
             adventure.\n\n\
             Current passage: {story_context}\n\n\
             Protagonist: {}\n",
            protagonist.describe()
        );
        if !suggestion.themes.is_empty() {
            prompt.push_str(&format!(
                "Players want more of: {}\n",
                suggestion.themes.join("; ")
            ));
        }
        if !suggestion.expansion_ideas.is_empty() {
            prompt.push_str(&format!(
                "Directions worth exploring: {}\n",
                suggestion.expansion_ideas.join("; ")
            ));
        }
        prompt.push_str(
            "\nWrite one narrative passage of 3-5 sentences continuing the\n\
             story for this protagonist, in second person. Return only the\n\
             passage.",
        );

        let response = self.client.complete(self.request(prompt)).await?;
        let narrative = response.text.trim().to_string();
        if narrative.is_empty() {
            return Err(StorytellerError::EmptyResponse(
                "empty continuation".to_string(),
            ));
        }

        Ok(narrative)
    }
}

/// Extract choice lines from a response, dropping blanks and stripping
/// any numbering or bullets the model added anyway.
fn parse_choice_lines(text: &str) -> Vec<String> {
    text.lines().filter_map(clean_item_line).collect()
}

/// Parse a THEMES / IMPROVEMENTS / EXPANSIONS sectioned response.
fn parse_analysis(text: &str) -> (Vec<String>, Vec<String>, Vec<String>) {
    #[derive(Clone, Copy, PartialEq)]
    enum Section {
        None,
        Themes,
        Improvements,
        Expansions,
    }

    let mut themes = Vec::new();
    let mut improvements = Vec::new();
    let mut expansion_ideas = Vec::new();
    let mut section = Section::None;

    for line in text.lines() {
        let trimmed = line.trim();
        let upper = trimmed.to_uppercase();
        if upper.starts_with("THEMES") {
            section = Section::Themes;
            continue;
        }
        if upper.starts_with("IMPROVEMENTS") {
            section = Section::Improvements;
            continue;
        }
        if upper.starts_with("EXPANSIONS") {
            section = Section::Expansions;
            continue;
        }

        let Some(item) = clean_item_line(trimmed) else {
            continue;
        };
        match section {
            Section::Themes => themes.push(item),
            Section::Improvements => improvements.push(item),
            Section::Expansions => expansion_ideas.push(item),
            Section::None => {}
        }
    }

    (themes, improvements, expansion_ideas)
}

/// Strip leading list markers ("1.", "2)", "-", "*") from a line;
/// returns None for lines that are empty once cleaned.
fn clean_item_line(line: &str) -> Option<String> {
    let mut rest = line.trim();

    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let after = &rest[digits..];
        if let Some(stripped) = after.strip_prefix('.').or_else(|| after.strip_prefix(')')) {
            rest = stripped;
        }
    } else if let Some(stripped) = rest
        .strip_prefix("- ")
        .or_else(|| rest.strip_prefix("* "))
        .or_else(|| rest.strip_prefix("\u{2022} "))
    {
        rest = stripped;
    }

    let cleaned = rest.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}
