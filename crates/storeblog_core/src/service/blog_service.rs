//! Blog use-case service.
//!
//! # Responsibility
//! - Run the save pipeline: normalize, validate, persist row, tag sets and
//!   image attachment.
//! - Compose the public read views: visible, recent, filtered lists, the
//!   archive index and related entries.
//!
//! # Invariants
//! - A save or destroy is all-or-nothing; a failed save leaves the caller's
//!   entry untouched.
//! - A stored `permalink` or `published_at` survives every later save.
//! - Blank filter input never narrows a result set.
//! - `visible`, `recent`, `related` and the archive only return visible
//!   entries.

use crate::config::{BlogConfig, ConfigError};
use crate::model::archive::{month_name, ArchiveMonth, ArchiveYear, BlogArchive};
use crate::model::blog_entry::{AuthorId, BlogEntry, BlogEntryId, ValidationErrors};
use crate::model::date_filter::{DateFilter, DateFilterError};
use crate::model::taxonomy::Taxonomy;
use crate::repo::author_repo::{AuthorRecord, AuthorRepository, SqliteAuthorRepository};
use crate::repo::entry_repo::{
    BlogEntryRepository, EntryOrder, EntryQuery, RepoError, SqliteBlogEntryRepository,
};
use crate::repo::image_store::{ImageStore, SqliteImageStore};
use crate::repo::tag_store::{SqliteTagStore, TagStore};
use crate::slug::{SlugGenerator, Slugifier};
use chrono::{DateTime, FixedOffset, Utc};
use log::{debug, info, warn};
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Per-tier cap in [`BlogService::related`], applied regardless of how many
/// entries are still needed.
pub const RELATED_TIER_LIMIT: u32 = 5;

/// Service error for blog use-cases.
#[derive(Debug)]
pub enum BlogServiceError {
    /// Save rejected; carries field-level messages.
    Validation(ValidationErrors),
    EntryNotFound(BlogEntryId),
    PermalinkNotFound(String),
    InvalidDate(DateFilterError),
    Config(ConfigError),
    Repo(RepoError),
}

impl Display for BlogServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "blog entry rejected: {err}"),
            Self::EntryNotFound(id) => write!(f, "blog entry not found: {id}"),
            Self::PermalinkNotFound(permalink) => {
                write!(f, "blog entry not found for permalink `{permalink}`")
            }
            Self::InvalidDate(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BlogServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::InvalidDate(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::EntryNotFound(_) | Self::PermalinkNotFound(_) => None,
        }
    }
}

impl From<RepoError> for BlogServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::EntryNotFound(id),
            RepoError::Validation(errors) => Self::Validation(errors),
            RepoError::InvalidConfig(err) => Self::Config(err),
            other => Self::Repo(other),
        }
    }
}

impl From<DateFilterError> for BlogServiceError {
    fn from(value: DateFilterError) -> Self {
        Self::InvalidDate(value)
    }
}

impl From<ConfigError> for BlogServiceError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

pub type BlogServiceResult<T> = Result<T, BlogServiceError>;

/// Blog service facade over repository implementations.
pub struct BlogService<R, T, I, A>
where
    R: BlogEntryRepository,
    T: TagStore,
    I: ImageStore,
    A: AuthorRepository,
{
    entries: R,
    tags: T,
    images: I,
    authors: A,
    slugs: Box<dyn SlugGenerator>,
    config: BlogConfig,
    offset: FixedOffset,
}

/// Service wired to SQLite repositories sharing one connection.
pub type SqliteBlogService<'conn> = BlogService<
    SqliteBlogEntryRepository<'conn>,
    SqliteTagStore<'conn>,
    SqliteImageStore<'conn>,
    SqliteAuthorRepository<'conn>,
>;

impl<'conn> SqliteBlogService<'conn> {
    /// Builds the service over a migrated connection.
    pub fn open(conn: &'conn Connection, config: BlogConfig) -> BlogServiceResult<Self> {
        let entries = SqliteBlogEntryRepository::try_new(conn)?;
        let tags = SqliteTagStore::try_new(conn)?;
        let images = SqliteImageStore::try_new(conn)?;
        let authors = SqliteAuthorRepository::try_new(conn, &config.author)?;
        Self::new(entries, tags, images, authors, config)
    }
}

impl<R, T, I, A> BlogService<R, T, I, A>
where
    R: BlogEntryRepository,
    T: TagStore,
    I: ImageStore,
    A: AuthorRepository,
{
    /// Creates a service using the provided repositories and the default
    /// [`Slugifier`].
    pub fn new(
        entries: R,
        tags: T,
        images: I,
        authors: A,
        config: BlogConfig,
    ) -> BlogServiceResult<Self> {
        config.validate()?;
        let offset = config.utc_offset()?;
        Ok(Self {
            entries,
            tags,
            images,
            authors,
            slugs: Box::new(Slugifier),
            config,
            offset,
        })
    }

    /// Replaces the permalink generator.
    pub fn with_slug_generator(mut self, slugs: impl SlugGenerator + 'static) -> Self {
        self.slugs = Box::new(slugs);
        self
    }

    pub fn config(&self) -> &BlogConfig {
        &self.config
    }

    /// Saves the entry using the current time for the publish latch.
    pub fn save(&self, entry: &mut BlogEntry) -> BlogServiceResult<BlogEntryId> {
        self.save_at(entry, Utc::now())
    }

    /// Saves the entry as of `now`.
    ///
    /// The row, both tag sets and the image attachment are written as one
    /// unit of work. On success `entry` carries the normalized state and its
    /// store id. On any failure `entry` and the store are left untouched.
    pub fn save_at(
        &self,
        entry: &mut BlogEntry,
        now: DateTime<Utc>,
    ) -> BlogServiceResult<BlogEntryId> {
        let started_at = Instant::now();
        let (id, saved) = self
            .entries
            .in_transaction(|| self.write_entry(entry, now))?;

        info!(
            "event=entry_save module=blog status=ok entry_id={id} visible={} duration_ms={}",
            saved.visible,
            started_at.elapsed().as_millis()
        );
        *entry = saved;
        Ok(id)
    }

    fn write_entry(
        &self,
        entry: &BlogEntry,
        now: DateTime<Utc>,
    ) -> BlogServiceResult<(BlogEntryId, BlogEntry)> {
        let mut candidate = entry.clone();
        if let Some(id) = candidate.id {
            let stored = self
                .entries
                .get_entry(id)?
                .ok_or(BlogServiceError::EntryNotFound(id))?;
            if stored.permalink.is_some() {
                candidate.permalink = stored.permalink;
            }
            if stored.published_at.is_some() {
                candidate.published_at = stored.published_at;
            }
        }

        candidate.normalize_for_save(now, self.slugs.as_ref());
        if let Err(errors) = candidate.validate(self.config.require_image) {
            let fields = errors
                .errors()
                .iter()
                .map(|error| error.field())
                .collect::<Vec<_>>()
                .join(",");
            warn!("event=entry_save module=blog status=rejected fields={fields}");
            return Err(BlogServiceError::Validation(errors));
        }

        let id = match candidate.id {
            Some(id) => {
                self.entries.update_entry(&candidate)?;
                id
            }
            None => {
                let id = self.entries.insert_entry(&candidate)?;
                candidate.id = Some(id);
                id
            }
        };

        for taxonomy in Taxonomy::ALL {
            self.tags.tag(id, taxonomy, candidate.names(taxonomy))?;
        }
        if let Some(image) = candidate.image.as_ref() {
            self.images.attach(id, image)?;
        }

        Ok((id, candidate))
    }

    /// Destroys the entry together with its image attachment and tag links.
    pub fn destroy(&self, id: BlogEntryId) -> BlogServiceResult<()> {
        let had_image = self.entries.in_transaction(|| {
            for taxonomy in Taxonomy::ALL {
                self.tags.tag(id, taxonomy, &[])?;
            }
            let had_image = self.images.destroy_for(id)?;
            self.entries.delete_entry(id)?;
            Ok::<_, BlogServiceError>(had_image)
        })?;
        info!("event=entry_destroy module=blog status=ok entry_id={id} had_image={had_image}");
        Ok(())
    }

    pub fn get(&self, id: BlogEntryId) -> BlogServiceResult<Option<BlogEntry>> {
        Ok(self.entries.get_entry(id)?)
    }

    /// Loads one entry, failing with `EntryNotFound` when absent.
    pub fn find_entry(&self, id: BlogEntryId) -> BlogServiceResult<BlogEntry> {
        self.entries
            .get_entry(id)?
            .ok_or(BlogServiceError::EntryNotFound(id))
    }

    pub fn get_by_permalink(&self, permalink: &str) -> BlogServiceResult<Option<BlogEntry>> {
        Ok(self.entries.get_by_permalink(permalink)?)
    }

    /// Loads one entry by permalink, failing with `PermalinkNotFound`.
    pub fn find_by_permalink(&self, permalink: &str) -> BlogServiceResult<BlogEntry> {
        self.entries
            .get_by_permalink(permalink)?
            .ok_or_else(|| BlogServiceError::PermalinkNotFound(permalink.to_string()))
    }

    /// Runs an arbitrary composed query.
    pub fn find(&self, query: &EntryQuery) -> BlogServiceResult<Vec<BlogEntry>> {
        Ok(self.entries.find_entries(query)?)
    }

    pub fn count(&self, query: &EntryQuery) -> BlogServiceResult<u64> {
        Ok(self.entries.count_entries(query)?)
    }

    pub fn visible(&self, order: EntryOrder) -> BlogServiceResult<Vec<BlogEntry>> {
        self.find(&EntryQuery::visible().order(order))
    }

    /// Newest visible entries; `None` uses the configured default.
    pub fn recent(&self, max: Option<u32>) -> BlogServiceResult<Vec<BlogEntry>> {
        let max = max.unwrap_or(self.config.recent_limit);
        self.find(&EntryQuery::visible().limit(max))
    }

    pub fn by_tag(&self, tag: &str) -> BlogServiceResult<Vec<BlogEntry>> {
        self.find(&EntryQuery::all().by_tag(tag))
    }

    pub fn by_category(&self, category: &str) -> BlogServiceResult<Vec<BlogEntry>> {
        self.find(&EntryQuery::all().by_category(category))
    }

    pub fn by_author(&self, author_id: Option<AuthorId>) -> BlogServiceResult<Vec<BlogEntry>> {
        self.find(&EntryQuery::all().by_author(author_id))
    }

    pub fn by_text(&self, text: &str) -> BlogServiceResult<Vec<BlogEntry>> {
        self.find(&EntryQuery::all().by_text(text))
    }

    pub fn by_date(&self, filter: Option<DateFilter>) -> BlogServiceResult<Vec<BlogEntry>> {
        let query = self.narrow_by_date(EntryQuery::all(), filter)?;
        self.find(&query)
    }

    /// Restricts `query` to the span of `filter` in the configured offset.
    /// `None` leaves the query unchanged.
    pub fn narrow_by_date(
        &self,
        query: EntryQuery,
        filter: Option<DateFilter>,
    ) -> BlogServiceResult<EntryQuery> {
        match filter {
            Some(filter) => Ok(query.published_within(filter.span(self.offset)?)),
            None => Ok(query),
        }
    }

    /// Builds the year → month → entries archive over visible entries.
    pub fn organize_by_archive(&self) -> BlogServiceResult<BlogArchive> {
        let started_at = Instant::now();
        let base = EntryQuery::visible();
        let mut archive = BlogArchive::default();

        for year in self.entries.published_years(&base, self.offset)? {
            let mut months = Vec::new();
            for month in self.entries.published_months(&base, year, self.offset)? {
                let query = self.narrow_by_date(base.clone(), Some(DateFilter::month(year, month)))?;
                let entries = self.entries.find_entries(&query)?;
                if entries.is_empty() {
                    continue;
                }
                let name = month_name(month).ok_or_else(|| {
                    RepoError::InvalidData(format!("invalid publication month `{month}`"))
                })?;
                months.push(ArchiveMonth {
                    month,
                    name: name.to_string(),
                    entries,
                });
            }
            if !months.is_empty() {
                archive.years.push(ArchiveYear { year, months });
            }
        }

        debug!(
            "event=archive_build module=blog status=ok years={} entries={} duration_ms={}",
            archive.years.len(),
            archive.entry_count(),
            started_at.elapsed().as_millis()
        );
        Ok(archive)
    }

    /// Up to `count` visible entries related to `entry`, never `entry`
    /// itself: category matches first, then tag matches, then the newest
    /// entries. Each tier contributes at most [`RELATED_TIER_LIMIT`].
    pub fn related(
        &self,
        entry: &BlogEntry,
        count: Option<usize>,
    ) -> BlogServiceResult<Vec<BlogEntry>> {
        let count = count.unwrap_or(self.config.related_count);
        let mut related: Vec<BlogEntry> = Vec::new();
        let mut excluded: Vec<BlogEntryId> = entry.id.into_iter().collect();

        for tier in [Some(Taxonomy::Categories), Some(Taxonomy::Tags), None] {
            if related.len() >= count {
                break;
            }

            let mut query = EntryQuery::visible()
                .excluding(excluded.iter().copied())
                .limit(RELATED_TIER_LIMIT);
            if let Some(taxonomy) = tier {
                query = query.tagged_with_any(taxonomy, entry.names(taxonomy));
                if query.tagged.is_empty() {
                    continue;
                }
            }

            for found in self.entries.find_entries(&query)? {
                excluded.extend(found.id);
                related.push(found);
            }
        }

        related.truncate(count);
        Ok(related)
    }

    /// Summary for display; `None` uses the configured length.
    pub fn entry_summary(&self, entry: &BlogEntry, chars: Option<usize>) -> String {
        entry.summary_text(chars.unwrap_or(self.config.summary_chars))
    }

    pub fn author_of(&self, entry: &BlogEntry) -> BlogServiceResult<Option<AuthorRecord>> {
        match entry.author_id {
            Some(author_id) => Ok(self.authors.find_author(author_id)?),
            None => Ok(None),
        }
    }

    /// Tag names in use under `taxonomy`.
    pub fn list_tags(&self, taxonomy: Taxonomy) -> BlogServiceResult<Vec<String>> {
        Ok(self.tags.list_tags(taxonomy)?)
    }

    /// Ids of every entry, visible or not, carrying `tag` under `taxonomy`.
    pub fn entry_ids_tagged(
        &self,
        taxonomy: Taxonomy,
        tag: &str,
    ) -> BlogServiceResult<BTreeSet<BlogEntryId>> {
        Ok(self.tags.find_by_tag(taxonomy, tag)?)
    }
}
