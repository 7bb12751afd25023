//! Blog domain model.
//!
//! # Responsibility
//! - Define the blog entry record and its save-time normalization rules.
//! - Define the value types used by queries (taxonomies, date filters) and
//!   by the archive index.
//!
//! # Invariants
//! - A persisted entry always has a non-blank permalink.
//! - `published_at` latches on the first visible save and is never reset.

pub mod archive;
pub mod blog_entry;
pub mod date_filter;
pub mod taxonomy;

/// Returns whether a text value is empty after trimming whitespace.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Returns whether an optional text value is absent or blank.
pub fn is_blank_opt(value: Option<&str>) -> bool {
    value.map_or(true, is_blank)
}
