//! Participant model — a named competitor.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A bot entered into a tournament.
///
/// Identity is the display name compared case-insensitively. The engine never
/// calls behaviour on a participant; it only groups and pairs them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Display name
    pub name: String,

    /// Free-form labels (author, submission path, ...)
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Participant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Builder method to attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Case-folded identity key.
    pub fn key(&self) -> String {
        name_key(&self.name)
    }

    /// Whether `name` refers to this participant.
    pub fn is_named(&self, name: &str) -> bool {
        self.key() == name_key(name)
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl From<&str> for Participant {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Case-folded key for a participant name.
pub fn name_key(name: &str) -> String {
    name.to_lowercase()
}

/// Case-insensitive alphabetical ordering, falling back to the raw name so the
/// order is total.
pub fn compare_names(a: &str, b: &str) -> std::cmp::Ordering {
    name_key(a).cmp(&name_key(b)).then_with(|| a.cmp(b))
}
