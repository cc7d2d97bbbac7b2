//! Player protagonist and attribute bucketing.
//!
//! The protagonist is an immutable value used for two things: text
//! substitution and cache-key derivation. Keys are built from coarse
//! attribute buckets rather than exact values, so players in the same
//! age range and gender category share cached choices by design.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Starting situations offered during character creation.
pub const STARTING_SITUATIONS: [&str; 4] = [
    "A mysterious traveler seeking ancient knowledge",
    "A scholar who stumbled into a magical realm",
    "A warrior searching for a lost artifact",
    "An ordinary person caught in extraordinary circumstances",
];

/// Player character with customizable attributes.
///
/// Carries no identity beyond the session; two protagonists with equal
/// fields are interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protagonist {
    pub name: String,
    pub gender: String,
    pub age: u8,
    pub situation: String,
}

impl Protagonist {
    /// Create a protagonist.
    pub fn new(
        name: impl Into<String>,
        gender: impl Into<String>,
        age: u8,
        situation: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            gender: gender.into(),
            age,
            situation: situation.into(),
        }
    }

    /// One-line description used in prompts and feedback snapshots.
    pub fn describe(&self) -> String {
        format!(
            "{} ({}, {}) - {}",
            self.name, self.gender, self.age, self.situation
        )
    }

    pub fn gender_bucket(&self) -> GenderBucket {
        GenderBucket::from_gender(&self.gender)
    }

    pub fn age_bucket(&self) -> AgeBucket {
        AgeBucket::from_age(self.age)
    }
}

impl fmt::Display for Protagonist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Coarse gender category used for cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenderBucket {
    Male,
    Female,
    Other,
}

impl GenderBucket {
    /// Case-insensitive match on "male"/"female"; everything else is Other.
    pub fn from_gender(gender: &str) -> Self {
        match gender.to_lowercase().as_str() {
            "male" => GenderBucket::Male,
            "female" => GenderBucket::Female,
            _ => GenderBucket::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GenderBucket::Male => "male",
            GenderBucket::Female => "female",
            GenderBucket::Other => "other",
        }
    }
}

/// Coarse age range used for cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeBucket {
    Young,
    Adult,
    MiddleAged,
    Elder,
}

impl AgeBucket {
    /// Bucket an age. Total over all of `u8`: ages below the youngest
    /// playable age still map to `Young`.
    pub fn from_age(age: u8) -> Self {
        match age {
            0..=25 => AgeBucket::Young,
            26..=40 => AgeBucket::Adult,
            41..=60 => AgeBucket::MiddleAged,
            _ => AgeBucket::Elder,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgeBucket::Young => "young",
            AgeBucket::Adult => "adult",
            AgeBucket::MiddleAged => "middle_aged",
            AgeBucket::Elder => "elder",
        }
    }
}

/// Derive both buckets for a protagonist.
pub fn bucket(protagonist: &Protagonist) -> (GenderBucket, AgeBucket) {
    (protagonist.gender_bucket(), protagonist.age_bucket())
}

/// Cache key combining node identity with the protagonist's buckets.
///
/// Protagonists that differ only within a bucket produce the same key;
/// that collision is the point of bucketing.
pub fn cache_key(node_id: &str, protagonist: &Protagonist) -> String {
    let (gender, age) = bucket(protagonist);
    format!("{}_{}_{}", node_id, gender.as_str(), age.as_str())
}

/// All substitution variables for a protagonist.
pub fn variables(protagonist: &Protagonist) -> HashMap<String, String> {
    let (gender, age) = bucket(protagonist);
    HashMap::from([
        ("name".to_string(), protagonist.name.clone()),
        ("gender".to_string(), protagonist.gender.clone()),
        ("age".to_string(), protagonist.age.to_string()),
        ("age_bucket".to_string(), age.as_str().to_string()),
        ("gender_bucket".to_string(), gender.as_str().to_string()),
        ("situation".to_string(), protagonist.situation.clone()),
    ])
}

/// Resolve `{var}` and `$var` placeholders using the protagonist's
/// variables.
pub fn resolve_variables(text: &str, protagonist: &Protagonist) -> String {
    substitute(text, &variables(protagonist))
}

/// Replace `{name}` and `$name` placeholders with values from the map.
///
/// Longer names substitute first so `$age` cannot clip `$age_bucket`.
pub fn substitute(text: &str, variables: &HashMap<String, String>) -> String {
    let mut names: Vec<&String> = variables.keys().collect();
    names.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

    let mut resolved = text.to_string();
    for name in names {
        let value = &variables[name];
        resolved = resolved.replace(&format!("{{{name}}}"), value);
        resolved = resolved.replace(&format!("${name}"), value);
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protagonist(age: u8, gender: &str) -> Protagonist {
        Protagonist::new("Aria", gender, age, STARTING_SITUATIONS[1])
    }

    #[test]
    fn test_age_buckets() {
        assert_eq!(AgeBucket::from_age(16), AgeBucket::Young);
        assert_eq!(AgeBucket::from_age(25), AgeBucket::Young);
        assert_eq!(AgeBucket::from_age(26), AgeBucket::Adult);
        assert_eq!(AgeBucket::from_age(40), AgeBucket::Adult);
        assert_eq!(AgeBucket::from_age(41), AgeBucket::MiddleAged);
        assert_eq!(AgeBucket::from_age(60), AgeBucket::MiddleAged);
        assert_eq!(AgeBucket::from_age(61), AgeBucket::Elder);
        assert_eq!(AgeBucket::from_age(100), AgeBucket::Elder);
    }

    #[test]
    fn test_gender_buckets() {
        assert_eq!(GenderBucket::from_gender("male"), GenderBucket::Male);
        assert_eq!(GenderBucket::from_gender("MALE"), GenderBucket::Male);
        assert_eq!(GenderBucket::from_gender("Female"), GenderBucket::Female);
        assert_eq!(GenderBucket::from_gender("non-binary"), GenderBucket::Other);
        assert_eq!(GenderBucket::from_gender(""), GenderBucket::Other);
    }

    #[test]
    fn test_bucketing_total_and_deterministic() {
        let genders = ["male", "Female", "non-binary", "agender", ""];
        for age in 16..=100u8 {
            for gender in genders {
                let p = protagonist(age, gender);
                let first = bucket(&p);
                let second = bucket(&p);
                assert_eq!(first, second, "bucketing must be idempotent");
            }
        }
    }

    #[test]
    fn test_cache_key_collides_within_bucket() {
        let a = Protagonist::new("Aria", "female", 27, "a scholar");
        let b = Protagonist::new("Brenn", "FEMALE", 39, "a warrior");
        assert_eq!(cache_key("gate", &a), cache_key("gate", &b));
        assert_eq!(cache_key("gate", &a), "gate_female_adult");
    }

    #[test]
    fn test_cache_key_differs_across_buckets() {
        let young = protagonist(20, "male");
        let elder = protagonist(70, "male");
        assert_ne!(cache_key("gate", &young), cache_key("gate", &elder));
    }

    #[test]
    fn test_variables_exposes_all_fields() {
        let p = protagonist(34, "female");
        let vars = variables(&p);
        assert_eq!(vars["name"], "Aria");
        assert_eq!(vars["gender"], "female");
        assert_eq!(vars["age"], "34");
        assert_eq!(vars["age_bucket"], "adult");
        assert_eq!(vars["gender_bucket"], "female");
        assert_eq!(vars["situation"], STARTING_SITUATIONS[1]);
    }

    #[test]
    fn test_resolve_both_placeholder_forms() {
        let p = protagonist(19, "male");
        let text = "{name} is a {age_bucket} $gender_bucket, age $age.";
        assert_eq!(
            resolve_variables(text, &p),
            "Aria is a young male, age 19."
        );
    }

    #[test]
    fn test_substitute_prefers_longer_names() {
        let p = protagonist(19, "male");
        // "$age_bucket" must not be clipped by the shorter "$age".
        assert_eq!(resolve_variables("$age_bucket", &p), "young");
    }

    #[test]
    fn test_describe() {
        let p = Protagonist::new("Aria", "female", 29, "a wanderer");
        assert_eq!(p.describe(), "Aria (female, 29) - a wanderer");
    }
}
