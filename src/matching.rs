//! Name matching strategies.
//!
//! Entity fallback extraction, allow-list usage detection and answer
//! validation all ask one question: does this stored name occur in this
//! text? The strategy is pluggable so a stronger matcher can replace plain
//! substring containment without touching pipeline code.

use serde::{Deserialize, Serialize};

/// Decides whether `name` occurs in `text`. An empty name never matches.
pub trait NameMatcher: Send + Sync {
    fn matches(&self, text: &str, name: &str) -> bool;
}

/// Exact substring containment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatcher;

impl NameMatcher for SubstringMatcher {
    fn matches(&self, text: &str, name: &str) -> bool {
        !name.is_empty() && text.contains(name)
    }
}

/// Containment after lowercasing and dropping whitespace and punctuation,
/// so `"Type-2 Diabetes"` matches `"type 2 diabetes"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedMatcher;

impl NormalizedMatcher {
    fn normalize(s: &str) -> String {
        s.chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect()
    }
}

impl NameMatcher for NormalizedMatcher {
    fn matches(&self, text: &str, name: &str) -> bool {
        let name = Self::normalize(name);
        !name.is_empty() && Self::normalize(text).contains(&name)
    }
}

/// Configuration selector for the built-in matchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatcherKind {
    #[default]
    Substring,
    Normalized,
}

impl MatcherKind {
    pub fn build(self) -> Box<dyn NameMatcher> {
        match self {
            MatcherKind::Substring => Box::new(SubstringMatcher),
            MatcherKind::Normalized => Box::new(NormalizedMatcher),
        }
    }
}
