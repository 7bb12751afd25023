//! Tag taxonomies and tag-name normalization.
//!
//! Tags and categories share one storage mechanism; the taxonomy decides
//! which namespace a tag link belongs to.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Namespace for a tag link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Taxonomy {
    /// Free-form topic tags.
    Tags,
    /// Editorial categories.
    Categories,
}

impl Taxonomy {
    /// Every taxonomy, in persistence order.
    pub const ALL: [Taxonomy; 2] = [Taxonomy::Tags, Taxonomy::Categories];

    /// Value stored in `taggings.context`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tags => "tags",
            Self::Categories => "categories",
        }
    }

    /// Parses a persisted `taggings.context` value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "tags" => Some(Self::Tags),
            "categories" => Some(Self::Categories),
            _ => None,
        }
    }
}

/// Normalizes one tag value: trimmed with its case kept, `None` when blank.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Trims, deduplicates case-insensitively and sorts tag values. The first
/// spelling of a name wins. Blank values are dropped.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut unique = BTreeMap::new();
    for tag in tags {
        if let Some(value) = normalize_tag(tag) {
            unique.entry(value.to_lowercase()).or_insert(value);
        }
    }
    unique.into_values().collect()
}
