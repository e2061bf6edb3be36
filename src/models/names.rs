//! Name domain record

use serde::{Deserialize, Serialize};

/// A generated name with a short meaning, pooled and served in pairs of
/// flat merge variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameEntry {
    pub name: String,
    pub meaning: String,
}

impl NameEntry {
    pub fn new(name: impl Into<String>, meaning: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            meaning: meaning.into(),
        }
    }
}
