//! Blog content model for the storefront.
//! This crate is the single source of truth for blog entry invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod slug;

pub use config::{AuthorConfig, BlogConfig, ConfigError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::archive::{ArchiveMonth, ArchiveYear, BlogArchive};
pub use model::blog_entry::{
    AuthorId, BlogEntry, BlogEntryId, BlogEntryValidationError, EntryImage, ValidationErrors,
};
pub use model::date_filter::{DateFilter, DateFilterError, Period, PublishedSpan};
pub use model::taxonomy::Taxonomy;
pub use repo::author_repo::{AuthorRecord, AuthorRepository, SqliteAuthorRepository};
pub use repo::entry_repo::{
    BlogEntryRepository, EntryOrder, EntryQuery, RepoError, RepoResult, SqliteBlogEntryRepository,
};
pub use repo::image_store::{ImageStore, SqliteImageStore};
pub use repo::tag_store::{SqliteTagStore, TagStore};
pub use service::blog_service::{
    BlogService, BlogServiceError, BlogServiceResult, SqliteBlogService, RELATED_TIER_LIMIT,
};
pub use slug::{SlugGenerator, Slugifier};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
