//! Blog component configuration.
//!
//! # Responsibility
//! - Carry host-provided settings into the blog service at construction.
//! - Name the author table the host uses for entry authors.
//!
//! # Invariants
//! - Author table and column names are plain SQL identifiers; they are
//!   interpolated into queries only after [`BlogConfig::validate`].

use chrono::FixedOffset;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Where entry authors live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorConfig {
    pub table: String,
    pub id_column: String,
    /// Column shown as the author's display name.
    pub name_column: String,
}

impl Default for AuthorConfig {
    fn default() -> Self {
        Self {
            table: "users".to_string(),
            id_column: "id".to_string(),
            name_column: "nickname".to_string(),
        }
    }
}

/// Settings for [`crate::BlogService`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogConfig {
    pub author: AuthorConfig,
    /// Offset used for day/month/year boundaries and the archive index.
    pub utc_offset_seconds: i32,
    /// Rejects saves without an attached image.
    pub require_image: bool,
    /// Default size of [`crate::BlogService::recent`].
    pub recent_limit: u32,
    /// Default length of derived summaries, in characters.
    pub summary_chars: usize,
    /// Default size of [`crate::BlogService::related`].
    pub related_count: usize,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            author: AuthorConfig::default(),
            utc_offset_seconds: 0,
            require_image: false,
            recent_limit: 5,
            summary_chars: 200,
            related_count: 5,
        }
    }
}

impl AuthorConfig {
    /// Checks that table and column names are plain identifiers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("author.table", &self.table),
            ("author.id_column", &self.id_column),
            ("author.name_column", &self.name_column),
        ] {
            if !IDENTIFIER_RE.is_match(value) {
                return Err(ConfigError::InvalidIdentifier {
                    key,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }
}

impl BlogConfig {
    /// Checks author identifiers and the UTC offset.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.author.validate()?;
        self.utc_offset()?;
        Ok(())
    }

    /// Offset for calendar boundaries; must lie strictly within +/-24h.
    pub fn utc_offset(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.utc_offset_seconds)
            .ok_or(ConfigError::InvalidUtcOffset(self.utc_offset_seconds))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidIdentifier { key: &'static str, value: String },
    InvalidUtcOffset(i32),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier { key, value } => {
                write!(f, "invalid SQL identifier for `{key}`: `{value}`")
            }
            Self::InvalidUtcOffset(seconds) => {
                write!(f, "utc offset must be within +/-24h, got {seconds}s")
            }
        }
    }
}

impl Error for ConfigError {}
