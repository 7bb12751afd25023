//! Permalink slug generation.
//!
//! # Invariants
//! - Generated slugs contain only lowercase letters, digits and single dashes.
//! - A generated slug is never empty.

use once_cell::sync::Lazy;
use regex::Regex;

const FALLBACK_SLUG: &str = "entry";

static AMPERSAND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*&\s*").expect("valid ampersand regex"));
static APOSTROPHE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"['\u{2019}]").expect("valid apostrophe regex"));
static SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("valid separator regex"));

/// Converts a title into a URL-safe permalink.
pub trait SlugGenerator {
    fn slugify(&self, text: &str) -> String;
}

/// Default slug generator.
///
/// `"Fish & Chips: Rock'n'Roll!"` becomes `"fish-and-chips-rocknroll"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Slugifier;

impl SlugGenerator for Slugifier {
    fn slugify(&self, text: &str) -> String {
        let lowered = text.trim().to_lowercase();
        let with_and = AMPERSAND_RE.replace_all(&lowered, " and ");
        let without_apostrophes = APOSTROPHE_RE.replace_all(&with_and, "");
        let separated = SEPARATOR_RE.replace_all(&without_apostrophes, "-");
        let slug = separated.trim_matches('-');
        if slug.is_empty() {
            FALLBACK_SLUG.to_string()
        } else {
            slug.to_string()
        }
    }
}
