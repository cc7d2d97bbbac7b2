//! The adaptive story tree.
//!
//! Owns the authored nodes, the player's cursor, and the policy that
//! decides where choices come from: authored children first, then the
//! choice cache, then the storyteller, then a static fallback pool.
//! Terminal nodes grow new branches from accumulated player feedback;
//! the tree only ever gains nodes, never loses or reshapes them.
//!
//! All collaborators are injected at construction. The tree holds no
//! global state and serves a single cursor.

use crate::cache::ChoiceCache;
use crate::feedback::{FeedbackStore, MIN_AVERAGE_RATING, MIN_FEEDBACK_COUNT};
use crate::protagonist::{cache_key, Protagonist};
use crate::storyteller::Storyteller;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use thiserror::Error;

/// Index of a node in the tree's arena.
pub type NodeIndex = usize;

/// Choices offered when no authored, cached or generated content
/// exists. Deliberately generic: they signal "improvise" rather than
/// promise specific content.
const FALLBACK_CHOICES: [&str; 4] = [
    "Continue exploring the area",
    "Look for more clues about your situation",
    "Try to remember how you got here",
    "Search for a way out",
];

/// How many choices a degraded fallback returns.
const FALLBACK_CHOICE_COUNT: usize = 3;

/// Errors from seed validation.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("seed contains no nodes")]
    EmptySeed,

    #[error("duplicate node id: {0}")]
    DuplicateNodeId(String),

    #[error("node {0} names unknown parent {1}")]
    UnknownParent(String, String),

    #[error("node {0} has no parent but the root is already {1}")]
    SecondRoot(String, String),
}

/// A single story node.
///
/// Identity is the string id, unique and immutable once created. Child
/// order is significant: it is the index space for choice selection.
#[derive(Debug, Clone)]
pub struct StoryNode {
    id: String,
    story_text: String,
    choice_label: Option<String>,
    parent: Option<NodeIndex>,
    children: Vec<NodeIndex>,
}

impl StoryNode {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn story_text(&self) -> &str {
        &self.story_text
    }

    /// Label shown when this node is listed as a sibling choice; falls
    /// back to a readable form of the id.
    pub fn label(&self) -> String {
        self.choice_label
            .clone()
            .unwrap_or_else(|| label_from_id(&self.id))
    }

    pub fn parent(&self) -> Option<NodeIndex> {
        self.parent
    }

    pub fn children(&self) -> &[NodeIndex] {
        &self.children
    }
}

/// One node of authored seed content.
#[derive(Debug, Clone)]
pub struct SeedNode {
    pub id: String,
    pub parent: Option<String>,
    pub story_text: String,
    pub choice_label: Option<String>,
}

/// Authored content the tree is initialized from.
#[derive(Debug, Clone, Default)]
pub struct StorySeed {
    nodes: Vec<SeedNode>,
}

impl StorySeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the root node. Call first; the tree's cursor starts here.
    pub fn root(mut self, id: impl Into<String>, story_text: impl Into<String>) -> Self {
        self.nodes.push(SeedNode {
            id: id.into(),
            parent: None,
            story_text: story_text.into(),
            choice_label: None,
        });
        self
    }

    /// Add a child node under an earlier node.
    pub fn child(
        mut self,
        parent: impl Into<String>,
        id: impl Into<String>,
        choice_label: impl Into<String>,
        story_text: impl Into<String>,
    ) -> Self {
        self.nodes.push(SeedNode {
            id: id.into(),
            parent: Some(parent.into()),
            story_text: story_text.into(),
            choice_label: Some(choice_label.into()),
        });
        self
    }

    /// The authored opening: a nine-node adventure start, three levels
    /// deep, that every session begins from.
    pub fn opening() -> Self {
        Self::new()
            .root(
                "awakening",
                "You come to on the cold floor of a forgotten archive, shelves \
                 rising into darkness on every side. You do not remember arriving. \
                 A spiral stair climbs toward a thin seam of daylight, and somewhere \
                 behind the shelves, water drips steadily in the dark.",
            )
            .child(
                "awakening",
                "climb_stair",
                "Climb the spiral stair",
                "The stair winds up into a ruined observatory. The great dome is \
                 shattered, open to a grey sky, yet at the room's center a brass \
                 orrery still turns on its own, tracing orbits for planets you do \
                 not recognize.",
            )
            .child(
                "awakening",
                "follow_drip",
                "Follow the sound of water",
                "Behind the farthest shelf you find a narrow passage, and beyond it \
                 an underground canal. A small skiff waits at a stone mooring, and a \
                 lantern hanging from its prow burns with a steady green flame.",
            )
            .child(
                "climb_stair",
                "inspect_orrery",
                "Inspect the turning orrery",
                "Up close, the orrery's planets are blown glass, each holding a \
                 slow swirl of color. One sphere glows brighter as you approach, \
                 and within it you glimpse a place you almost remember.",
            )
            .child(
                "climb_stair",
                "call_out",
                "Call out into the ruins",
                "Your voice rolls through the broken dome and down unseen halls. \
                 For a long moment there is nothing. Then, from below, comes an \
                 answer: footsteps, unhurried, drawing closer.",
            )
            .child(
                "follow_drip",
                "board_skiff",
                "Board the waiting skiff",
                "As you step aboard, the mooring rope slips itself free. The skiff \
                 glides into a vaulted waterway lit by constellations of pale \
                 glowworms, carrying you deeper beneath the city.",
            )
            .child(
                "follow_drip",
                "take_lantern",
                "Take the green lantern",
                "The lantern is light in your hand, and its green glow reaches \
                 farther than any flame should. It picks out chalk marks along the \
                 canal wall: a trail, left for someone. Perhaps for you.",
            )
            .child(
                "inspect_orrery",
                "touch_glowing_sphere",
                "Touch the glowing sphere",
                "The glass is warm. Visions pour through you: other wanderers who \
                 woke in the archive before you, each choice they made bending \
                 these halls into new shapes. This place remembers, and it is \
                 listening to you now.",
            )
            .child(
                "board_skiff",
                "ride_to_landing",
                "Ride to the far landing",
                "The skiff sets you down at a lamplit landing where a robed keeper \
                 waits, unsurprised. 'Another dreamer arrives,' she says. 'Your \
                 story is already being written here. Shall we read it together?'",
            )
    }
}

/// Result of a `select` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectOutcome {
    /// The cursor moved to a new node.
    pub advanced: bool,

    /// The selection landed on a terminal node, so expansion was the
    /// only possible way forward.
    pub awaiting_expansion: bool,
}

/// The story tree orchestrator.
pub struct StoryTree {
    nodes: Vec<StoryNode>,
    index: HashMap<String, NodeIndex>,
    cursor: NodeIndex,
    cache: ChoiceCache,
    feedback: FeedbackStore,
    storyteller: Option<Box<dyn Storyteller>>,
    /// Feedback count seen at the last successful expansion, per node.
    /// A node is only reconsidered once new feedback arrives past this
    /// watermark, so rescans cannot regrow the same branch.
    expansion_watermark: HashMap<String, usize>,
}

impl StoryTree {
    /// Build a tree from seed content and injected collaborators.
    ///
    /// The seed must contain exactly one root (its first node) and list
    /// every parent before its children. The cursor starts at the root,
    /// which exists for the lifetime of the tree.
    pub fn new(
        seed: StorySeed,
        cache: ChoiceCache,
        feedback: FeedbackStore,
        storyteller: Option<Box<dyn Storyteller>>,
    ) -> Result<Self, TreeError> {
        if seed.nodes.is_empty() {
            return Err(TreeError::EmptySeed);
        }

        let mut tree = Self {
            nodes: Vec::with_capacity(seed.nodes.len()),
            index: HashMap::new(),
            cursor: 0,
            cache,
            feedback,
            storyteller,
            expansion_watermark: HashMap::new(),
        };

        for node in seed.nodes {
            if tree.index.contains_key(&node.id) {
                return Err(TreeError::DuplicateNodeId(node.id));
            }
            let parent = match node.parent {
                Some(parent_id) => match tree.index.get(&parent_id) {
                    Some(&idx) => Some(idx),
                    None => return Err(TreeError::UnknownParent(node.id, parent_id)),
                },
                None => {
                    if !tree.nodes.is_empty() {
                        return Err(TreeError::SecondRoot(
                            node.id,
                            tree.nodes[0].id.clone(),
                        ));
                    }
                    None
                }
            };
            tree.add_node(parent, node.id, node.story_text, node.choice_label);
        }

        Ok(tree)
    }

    /// The current node's story text.
    pub fn current_story(&self) -> &str {
        &self.nodes[self.cursor].story_text
    }

    /// The current node's id.
    pub fn current_node_id(&self) -> &str {
        &self.nodes[self.cursor].id
    }

    /// Look up a node by id.
    pub fn node(&self, node_id: &str) -> Option<&StoryNode> {
        self.index.get(node_id).map(|&idx| &self.nodes[idx])
    }

    /// Total number of nodes, authored and grown.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the current node has no children.
    pub fn is_terminal(&self) -> bool {
        self.nodes[self.cursor].children.is_empty()
    }

    pub fn feedback(&self) -> &FeedbackStore {
        &self.feedback
    }

    pub fn feedback_mut(&mut self) -> &mut FeedbackStore {
        &mut self.feedback
    }

    pub fn cache(&self) -> &ChoiceCache {
        &self.cache
    }

    /// Choices available at the current node, in selection-index order.
    ///
    /// Authored children always win. Otherwise the choice cache is
    /// consulted under the protagonist's bucketed key, then the
    /// storyteller (successful generations are written through to the
    /// cache), and finally a shuffled static fallback. Storyteller
    /// failures are logged and fall through; the player never sees one.
    pub async fn available_choices(&mut self, protagonist: &Protagonist) -> Vec<String> {
        let node = &self.nodes[self.cursor];
        if !node.children.is_empty() {
            return node
                .children
                .iter()
                .map(|&child| self.nodes[child].label())
                .collect();
        }

        let node_id = node.id.clone();
        let story_text = node.story_text.clone();
        let key = cache_key(&node_id, protagonist);
        if let Some(cached) = self.cache.get(&key) {
            return cached.to_vec();
        }

        if let Some(storyteller) = self.storyteller.as_deref() {
            match storyteller.propose_choices(&story_text, protagonist).await {
                Ok(choices) => {
                    self.cache.set(key, choices.clone()).await;
                    return choices;
                }
                Err(e) => {
                    tracing::warn!("Choice generation failed at {node_id}: {e}");
                }
            }
        }

        fallback_choices()
    }

    /// Apply a player's selection.
    ///
    /// At a node with authored children, an in-range index advances the
    /// cursor and an out-of-range index is rejected. At a terminal
    /// node the index is irrelevant: the tree attempts feedback-driven
    /// expansion, advancing into the first grown branch if one appears.
    pub async fn select(
        &mut self,
        choice_index: usize,
        protagonist: &Protagonist,
    ) -> SelectOutcome {
        let children = &self.nodes[self.cursor].children;
        if !children.is_empty() {
            if let Some(&child) = children.get(choice_index) {
                self.cursor = child;
                return SelectOutcome {
                    advanced: true,
                    awaiting_expansion: false,
                };
            }
            return SelectOutcome {
                advanced: false,
                awaiting_expansion: false,
            };
        }

        let created = self.try_expand(protagonist).await;
        if let Some(first) = created.first() {
            if let Some(&idx) = self.index.get(first) {
                self.cursor = idx;
                return SelectOutcome {
                    advanced: true,
                    awaiting_expansion: true,
                };
            }
        }

        SelectOutcome {
            advanced: false,
            awaiting_expansion: true,
        }
    }

    /// Grow new branches from accumulated feedback.
    ///
    /// Scans every node that clears the expansion gates, analyzes its
    /// feedback, and attaches one new child per node that survives the
    /// analysis. The eligibility gate and the analysis quality re-check
    /// overlap deliberately, guarding against state that moved between
    /// the scan and the call. Returns the ids of all nodes created;
    /// existing nodes are never touched.
    pub async fn try_expand(&mut self, protagonist: &Protagonist) -> Vec<String> {
        let mut created = Vec::new();
        if self.storyteller.is_none() {
            return created;
        }

        let candidates = self
            .feedback
            .nodes_eligible_for_expansion(MIN_FEEDBACK_COUNT, MIN_AVERAGE_RATING);

        for node_id in candidates {
            let Some(&parent_idx) = self.index.get(&node_id) else {
                tracing::warn!("Feedback references unknown node {node_id}; skipping");
                continue;
            };

            let summary = self.feedback.summary_for(&node_id);
            let already_seen = self
                .expansion_watermark
                .get(&node_id)
                .is_some_and(|&seen| summary.count <= seen);
            if already_seen {
                continue;
            }
            if summary.count < 2 {
                continue;
            }

            let story_text = self.nodes[parent_idx].story_text.clone();
            let Some(storyteller) = self.storyteller.as_deref() else {
                break;
            };

            let suggestion = match storyteller.analyze_feedback(&story_text, &summary).await {
                Ok(suggestion) => suggestion,
                Err(e) => {
                    tracing::warn!("Feedback analysis failed for {node_id}: {e}");
                    continue;
                }
            };
            if suggestion.average_rating < MIN_AVERAGE_RATING {
                continue;
            }

            let narrative = match storyteller
                .continue_story(&story_text, protagonist, &suggestion)
                .await
            {
                Ok(narrative) => narrative,
                Err(e) => {
                    tracing::warn!("Continuation failed for {node_id}: {e}");
                    continue;
                }
            };

            let child_number = self.nodes[parent_idx].children.len() + 1;
            let child_id = format!("{node_id}_expanded_{child_number}");
            let label = suggestion.expansion_ideas.first().cloned();
            self.add_node(Some(parent_idx), child_id.clone(), narrative, label);
            self.expansion_watermark.insert(node_id.clone(), summary.count);
            tracing::info!("Expanded {node_id} with {child_id}");
            created.push(child_id);
        }

        created
    }

    fn add_node(
        &mut self,
        parent: Option<NodeIndex>,
        id: String,
        story_text: String,
        choice_label: Option<String>,
    ) -> NodeIndex {
        let idx = self.nodes.len();
        self.index.insert(id.clone(), idx);
        self.nodes.push(StoryNode {
            id,
            story_text,
            choice_label,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent].children.push(idx);
        }
        idx
    }
}

/// Three fallback choices in a fresh random order.
fn fallback_choices() -> Vec<String> {
    let mut pool: Vec<String> = FALLBACK_CHOICES.iter().map(|c| c.to_string()).collect();
    pool.shuffle(&mut rand::thread_rng());
    pool.truncate(FALLBACK_CHOICE_COUNT);
    pool
}

/// Readable fallback label for a node without authored choice text.
fn label_from_id(id: &str) -> String {
    id.split('_')
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
