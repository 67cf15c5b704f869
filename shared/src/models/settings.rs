//! Porter Settings Model

use crate::util::sanitize_key;
use serde::{Deserialize, Serialize};

/// Extra product data carried through export and import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PorterSettings {
    /// Custom meta keys exported alongside core fields
    #[serde(default)]
    pub custom_meta_keys: Vec<String>,
    /// Taxonomies exported beyond `product_cat` and `product_tag`
    #[serde(default)]
    pub custom_taxonomies: Vec<String>,
}

/// Either a newline-separated block of text or a list of lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinesInput {
    Text(String),
    List(Vec<String>),
}

impl LinesInput {
    /// Trim every line, drop empties and duplicates, then sanitize each
    /// line into a key. First occurrence wins.
    pub fn sanitize(&self) -> Vec<String> {
        let lines: Vec<&str> = match self {
            Self::Text(text) => text.lines().collect(),
            Self::List(items) => items.iter().flat_map(|s| s.lines()).collect(),
        };
        let mut out: Vec<String> = Vec::new();
        for line in lines.into_iter().map(str::trim).filter(|l| !l.is_empty()) {
            let key = sanitize_key(line);
            if !key.is_empty() && !out.contains(&key) {
                out.push(key);
            }
        }
        out
    }
}

/// Settings update payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PorterSettingsUpdate {
    pub custom_meta_keys: Option<LinesInput>,
    pub custom_taxonomies: Option<LinesInput>,
}

impl PorterSettings {
    /// Apply an update; fields left out of the payload are cleared, matching
    /// a full form submission.
    pub fn from_update(update: &PorterSettingsUpdate) -> Self {
        Self {
            custom_meta_keys: update
                .custom_meta_keys
                .as_ref()
                .map(LinesInput::sanitize)
                .unwrap_or_default(),
            custom_taxonomies: update
                .custom_taxonomies
                .as_ref()
                .map(LinesInput::sanitize)
                .unwrap_or_default(),
        }
    }
}
