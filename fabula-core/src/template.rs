//! User-defined story templates.
//!
//! A small string-substitution facility: a template declares custom
//! variables with validation rules and renders by combining supplied
//! values with the protagonist's variables. The frontend uses it to
//! offer customized opening prose; nothing here touches the tree.

use crate::protagonist::{substitute, variables, Protagonist};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// A validation problem with supplied template values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("required variable '{0}' not provided")]
    MissingVariable(String),

    #[error("variable '{name}' must be one of: {options}")]
    InvalidChoice { name: String, options: String },

    #[error("variable '{name}' must be a number")]
    NotANumber { name: String },

    #[error("variable '{name}' must be between {min} and {max}")]
    OutOfRange { name: String, min: i64, max: i64 },

    #[error("variable '{name}' must be true or false")]
    InvalidBoolean { name: String },
}

/// The kind of value a custom variable accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VariableKind {
    Text,
    Choice { options: Vec<String> },
    Range { min: i64, max: i64 },
    Boolean,
}

/// A user-facing variable a template asks for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomVariable {
    pub name: String,
    pub description: String,
    pub kind: VariableKind,
    pub default: Option<String>,
}

impl CustomVariable {
    pub fn text(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind: VariableKind::Text,
            default: None,
        }
    }

    pub fn choice(
        name: impl Into<String>,
        description: impl Into<String>,
        options: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind: VariableKind::Choice {
                options: options.iter().map(|o| o.to_string()).collect(),
            },
            default: None,
        }
    }

    pub fn range(
        name: impl Into<String>,
        description: impl Into<String>,
        min: i64,
        max: i64,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind: VariableKind::Range { min, max },
            default: None,
        }
    }

    pub fn boolean(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind: VariableKind::Boolean,
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Check one supplied value against this variable's rules.
    fn validate(&self, value: &str) -> Option<TemplateError> {
        match &self.kind {
            VariableKind::Text => None,
            VariableKind::Choice { options } => {
                if options.iter().any(|o| o == value) {
                    None
                } else {
                    Some(TemplateError::InvalidChoice {
                        name: self.name.clone(),
                        options: options.join(", "),
                    })
                }
            }
            VariableKind::Range { min, max } => match value.parse::<i64>() {
                Err(_) => Some(TemplateError::NotANumber {
                    name: self.name.clone(),
                }),
                Ok(n) if n < *min || n > *max => Some(TemplateError::OutOfRange {
                    name: self.name.clone(),
                    min: *min,
                    max: *max,
                }),
                Ok(_) => None,
            },
            VariableKind::Boolean => {
                if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
                    None
                } else {
                    Some(TemplateError::InvalidBoolean {
                        name: self.name.clone(),
                    })
                }
            }
        }
    }
}

/// A preset bundle of variable values.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub values: HashMap<String, String>,
}

/// A story template with placeholders for custom and protagonist
/// variables.
#[derive(Debug, Clone)]
pub struct StoryTemplate {
    pub id: String,
    pub title: String,
    pub description: String,
    body: String,
    variables: Vec<CustomVariable>,
    scenarios: Vec<Scenario>,
}

impl StoryTemplate {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            body: String::new(),
            variables: Vec::new(),
            scenarios: Vec::new(),
        }
    }

    /// Set the template body text.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Declare a custom variable.
    pub fn variable(mut self, variable: CustomVariable) -> Self {
        self.variables.push(variable);
        self
    }

    /// Add a preset scenario.
    pub fn scenario(mut self, name: impl Into<String>, values: &[(&str, &str)]) -> Self {
        self.scenarios.push(Scenario {
            name: name.into(),
            values: values
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        self
    }

    pub fn variables(&self) -> &[CustomVariable] {
        &self.variables
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    /// Check supplied values against the declared variables. Returns
    /// every violation, not just the first; an empty list means valid.
    pub fn validate(&self, values: &HashMap<String, String>) -> Vec<TemplateError> {
        let mut errors = Vec::new();
        for variable in &self.variables {
            match values.get(&variable.name) {
                None => {
                    if variable.default.is_none() {
                        errors.push(TemplateError::MissingVariable(variable.name.clone()));
                    }
                }
                Some(value) => {
                    if let Some(error) = variable.validate(value) {
                        errors.push(error);
                    }
                }
            }
        }
        errors
    }

    /// Render the body. Declared defaults fill unsupplied variables and
    /// the protagonist's variables are merged in last; unresolved
    /// placeholders pass through unchanged.
    pub fn render(
        &self,
        values: &HashMap<String, String>,
        protagonist: Option<&Protagonist>,
    ) -> String {
        let mut all = HashMap::new();
        for variable in &self.variables {
            if let Some(default) = &variable.default {
                all.insert(variable.name.clone(), default.clone());
            }
        }
        for (name, value) in values {
            all.insert(name.clone(), value.clone());
        }
        if let Some(protagonist) = protagonist {
            all.extend(variables(protagonist));
        }
        substitute(&self.body, &all)
    }
}

/// Built-in templates plus any registered at runtime.
#[derive(Debug, Clone)]
pub struct TemplateLibrary {
    templates: Vec<StoryTemplate>,
}

impl TemplateLibrary {
    /// A library holding the built-in templates.
    pub fn new() -> Self {
        Self {
            templates: vec![fantasy_template(), scifi_template()],
        }
    }

    /// Register a template.
    pub fn add(&mut self, template: StoryTemplate) {
        self.templates.push(template);
    }

    /// Look up a template by id.
    pub fn get(&self, id: &str) -> Option<&StoryTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn templates(&self) -> &[StoryTemplate] {
        &self.templates
    }
}

impl Default for TemplateLibrary {
    fn default() -> Self {
        Self::new()
    }
}

fn fantasy_template() -> StoryTemplate {
    StoryTemplate::new(
        "fantasy_adventure",
        "Fantasy Adventure",
        "A customizable fantasy opening with magical elements",
    )
    .variable(CustomVariable::choice(
        "setting",
        "Where the adventure begins",
        &[
            "enchanted_forest",
            "ancient_castle",
            "mystical_mountains",
            "underground_dungeon",
        ],
    ))
    .variable(CustomVariable::choice(
        "magical_item",
        "A magical item the protagonist encounters",
        &[
            "glowing_crystal",
            "ancient_scroll",
            "enchanted_mirror",
            "mysterious_amulet",
        ],
    ))
    .variable(
        CustomVariable::range("threat_level", "How dangerous the adventure should be", 1, 10)
            .with_default("5"),
    )
    .with_body(
        "You wake in a {setting} with no memory of the road that brought you \
         here. As a {age_bucket} {gender_bucket} {situation}, you take in your \
         surroundings slowly, and your eye catches on a {magical_item} pulsing \
         with a light of its own. The air itself feels charged, promising both \
         wonder and danger (threat level: {threat_level}/10), and every path \
         out of this place is a story waiting to be chosen.",
    )
    .scenario(
        "Lost Scholar",
        &[
            ("setting", "ancient_castle"),
            ("magical_item", "ancient_scroll"),
            ("threat_level", "3"),
        ],
    )
    .scenario(
        "Dangerous Quest",
        &[
            ("setting", "underground_dungeon"),
            ("magical_item", "glowing_crystal"),
            ("threat_level", "8"),
        ],
    )
}

fn scifi_template() -> StoryTemplate {
    StoryTemplate::new(
        "scifi_exploration",
        "Sci-Fi Exploration",
        "A space exploration opening with technology and alien worlds",
    )
    .variable(CustomVariable::choice(
        "location",
        "Where the adventure takes place",
        &[
            "space_station",
            "alien_planet",
            "generation_ship",
            "research_facility",
        ],
    ))
    .variable(
        CustomVariable::range("tech_level", "Level of available technology", 1, 10)
            .with_default("7"),
    )
    .variable(
        CustomVariable::boolean("alien_presence", "Whether something else is out there")
            .with_default("true"),
    )
    .with_body(
        "You find yourself aboard a {location}, instruments humming at tech \
         level {tech_level}/10. As a {age_bucket} {gender_bucket} {situation}, \
         you are better equipped than most, yet the readouts make no sense: \
         sensors insist the signals you are tracking are real (alien presence: \
         {alien_presence}). Whatever you decide next will decide the mission.",
    )
}
