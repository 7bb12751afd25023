//! Blog store bootstrap: connection setup and the schema migration chain.
//!
//! # Responsibility
//! - Hand out connections with the blog schema (entries, taggings, image
//!   attachments, author indexes) fully applied.
//! - Report which blog migration failed, or that a store was written by a
//!   newer release.
//!
//! # Invariants
//! - The applied schema version lives in `PRAGMA user_version`.
//! - Repositories refuse connections that did not come through this module.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// A blog migration failed; nothing from the pending chain was applied.
    MigrationFailed {
        version: u32,
        name: &'static str,
        source: rusqlite::Error,
    },
    /// The store was migrated by a newer release than this one.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "blog store error: {err}"),
            Self::MigrationFailed {
                version,
                name,
                source,
            } => write!(f, "blog migration {version:04}_{name} failed: {source}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "blog store schema {db_version} was written by a newer release; this build supports up to {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::MigrationFailed { source, .. } => Some(source),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
