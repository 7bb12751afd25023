//! Blog entry domain model.
//!
//! # Responsibility
//! - Define the canonical blog entry record and its image attachment.
//! - Own save-time normalization (permalink, publish latch, tag sets).
//! - Own save-time validation and the derived summary.
//!
//! # Invariants
//! - `permalink` is derived from `title` only while blank.
//! - `published_at` is assigned once, on the first visible save.
//! - `title` and `body` are non-blank when persisted.

use crate::model::taxonomy::{normalize_tags, Taxonomy};
use crate::model::{is_blank, is_blank_opt};
use crate::slug::SlugGenerator;
use chrono::{DateTime, SubsecRound, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned entry identifier.
pub type BlogEntryId = i64;

/// Identifier of a row in the configured author table.
pub type AuthorId = i64;

/// Marker appended to bodies truncated into a summary.
pub const SUMMARY_ELLIPSIS: &str = "...";

// Rich-text editors submit a lone line break for an empty field.
static PLACEHOLDER_BODY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\A\s*<br\s*/?>\s*\z").expect("valid placeholder regex"));

/// Image attached one-to-one to an entry.
///
/// Only the attachment record lives here; the bytes belong to the host's
/// image service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryImage {
    pub file_name: String,
    pub content_type: Option<String>,
    pub file_size: Option<i64>,
    pub alt: Option<String>,
}

impl EntryImage {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            file_size: None,
            alt: None,
        }
    }

    /// Returns whether every field is empty, in which case the image is
    /// treated as not submitted.
    pub fn is_blank(&self) -> bool {
        is_blank(&self.file_name)
            && is_blank_opt(self.content_type.as_deref())
            && self.file_size.is_none()
            && is_blank_opt(self.alt.as_deref())
    }
}

/// Canonical blog entry record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogEntry {
    /// `None` until the entry is first saved.
    pub id: Option<BlogEntryId>,
    pub title: String,
    /// Rich-text body.
    pub body: String,
    /// Hand-written summary. Blank means "derive from body".
    pub summary: Option<String>,
    /// URL slug, derived from the title on first save.
    pub permalink: Option<String>,
    /// Latched on the first visible save.
    pub published_at: Option<DateTime<Utc>>,
    /// Controls inclusion in every public-facing query.
    pub visible: bool,
    pub author_id: Option<AuthorId>,
    /// Names under [`Taxonomy::Tags`].
    pub tags: Vec<String>,
    /// Names under [`Taxonomy::Categories`].
    pub categories: Vec<String>,
    pub image: Option<EntryImage>,
}

impl BlogEntry {
    /// Creates an unsaved, hidden entry.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            body: body.into(),
            summary: None,
            permalink: None,
            published_at: None,
            visible: false,
            author_id: None,
            tags: Vec::new(),
            categories: Vec::new(),
            image: None,
        }
    }

    /// Returns whether the store has assigned an id.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Tag names held under one taxonomy.
    pub fn names(&self, taxonomy: Taxonomy) -> &[String] {
        match taxonomy {
            Taxonomy::Tags => &self.tags,
            Taxonomy::Categories => &self.categories,
        }
    }

    /// Replaces the tag names held under one taxonomy.
    pub fn set_names(&mut self, taxonomy: Taxonomy, names: Vec<String>) {
        match taxonomy {
            Taxonomy::Tags => self.tags = names,
            Taxonomy::Categories => self.categories = names,
        }
    }

    /// Applies save-time normalization.
    ///
    /// - Blank `permalink` is derived from `title`.
    /// - Blank `published_at` is set to `now` when the entry is visible.
    /// - Tag sets are normalized; a blank image is dropped.
    ///
    /// `now` is truncated to millisecond precision, the store's resolution.
    pub fn normalize_for_save(&mut self, now: DateTime<Utc>, slugs: &dyn SlugGenerator) {
        if is_blank_opt(self.permalink.as_deref()) {
            self.permalink = Some(slugs.slugify(&self.title));
        }

        if self.published_at.is_none() && self.visible {
            self.published_at = Some(now.trunc_subsecs(3));
        }

        self.tags = normalize_tags(&self.tags);
        self.categories = normalize_tags(&self.categories);

        if self.image.as_ref().is_some_and(EntryImage::is_blank) {
            self.image = None;
        }
    }

    /// Validates the entry for persistence, collecting every violation.
    pub fn validate(&self, require_image: bool) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();

        if is_blank(&self.title) {
            errors.push(BlogEntryValidationError::BlankTitle);
        }
        if is_blank(&self.body) {
            errors.push(BlogEntryValidationError::BlankBody);
        } else if PLACEHOLDER_BODY_RE.is_match(&self.body) {
            errors.push(BlogEntryValidationError::PlaceholderBody);
        }
        match self.image.as_ref() {
            None if require_image => errors.push(BlogEntryValidationError::MissingImage),
            Some(image) if is_blank(&image.file_name) => {
                errors.push(BlogEntryValidationError::BlankImageFileName);
            }
            _ => {}
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(errors))
        }
    }

    /// Returns the hand-written summary, or the first `chars` characters of
    /// the body followed by [`SUMMARY_ELLIPSIS`].
    pub fn summary_text(&self, chars: usize) -> String {
        match self.summary.as_deref() {
            Some(summary) if !is_blank(summary) => summary.to_string(),
            _ => {
                let mut text: String = self.body.chars().take(chars).collect();
                text.push_str(SUMMARY_ELLIPSIS);
                text
            }
        }
    }
}

/// Single field-level save rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlogEntryValidationError {
    BlankTitle,
    BlankBody,
    /// Body holds only the editor's empty-line markup.
    PlaceholderBody,
    /// Image attachment is required by configuration but absent.
    MissingImage,
    /// Image submitted with metadata but no file.
    BlankImageFileName,
}

impl BlogEntryValidationError {
    /// Name of the offending field.
    pub fn field(self) -> &'static str {
        match self {
            Self::BlankTitle => "title",
            Self::BlankBody | Self::PlaceholderBody => "body",
            Self::MissingImage | Self::BlankImageFileName => "image",
        }
    }
}

impl Display for BlogEntryValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankImageFileName => write!(f, "image file name can't be blank"),
            _ => write!(f, "{} can't be blank", self.field()),
        }
    }
}

impl Error for BlogEntryValidationError {}

/// Every violation found by [`BlogEntry::validate`], in field order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<BlogEntryValidationError>);

impl ValidationErrors {
    pub fn errors(&self) -> &[BlogEntryValidationError] {
        &self.0
    }

    pub fn contains(&self, error: BlogEntryValidationError) -> bool {
        self.0.contains(&error)
    }

    /// Messages for one field, e.g. `["body can't be blank"]`.
    pub fn messages_for(&self, field: &str) -> Vec<String> {
        self.0
            .iter()
            .filter(|error| error.field() == field)
            .map(ToString::to_string)
            .collect()
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let messages = self.0.iter().map(ToString::to_string).collect::<Vec<_>>();
        write!(f, "{}", messages.join("; "))
    }
}

impl Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::{BlogEntry, BlogEntryValidationError, EntryImage};
    use crate::slug::Slugifier;
    use chrono::{TimeZone, Utc};

    #[test]
    fn placeholder_body_variants_are_rejected() {
        for body in ["<br>", "<BR/>", " <br /> \n"] {
            let entry = BlogEntry::new("Title", body);
            let errors = entry.validate(false).unwrap_err();
            assert_eq!(errors.errors(), &[BlogEntryValidationError::PlaceholderBody]);
        }
    }

    #[test]
    fn body_containing_line_breaks_among_text_is_valid() {
        let entry = BlogEntry::new("Title", "first line<br>second line");
        assert!(entry.validate(false).is_ok());
    }

    #[test]
    fn blank_image_is_dropped_on_normalize() {
        let mut entry = BlogEntry::new("Title", "Body");
        entry.image = Some(EntryImage::new("  "));
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        entry.normalize_for_save(now, &Slugifier);
        assert_eq!(entry.image, None);
        assert!(entry.validate(true).is_err());
    }

    #[test]
    fn image_without_file_name_is_rejected_even_when_optional() {
        let mut entry = BlogEntry::new("Title", "Body");
        entry.image = Some(EntryImage {
            alt: Some("Storefront".to_string()),
            ..EntryImage::new("")
        });
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        entry.normalize_for_save(now, &Slugifier);

        let errors = entry.validate(false).unwrap_err();
        assert_eq!(errors.errors(), &[BlogEntryValidationError::BlankImageFileName]);
        assert_eq!(
            errors.messages_for("image"),
            vec!["image file name can't be blank"]
        );
    }

    #[test]
    fn summary_counts_characters_not_bytes() {
        let entry = BlogEntry::new("Title", "ééééé");
        assert_eq!(entry.summary_text(3), "ééé...");
    }
}
