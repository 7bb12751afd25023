//! Blog entry repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over `blog_entries`.
//! - Compose filtered, ordered and limited entry queries (`EntryQuery`).
//! - Provide the distinct year/month aggregates behind the archive index.
//!
//! # Invariants
//! - Read paths hydrate tags, categories and the image attachment.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Unless overridden, results are ordered by `published_at DESC, id DESC`.
//! - Updates never clear or replace a stored `permalink` or `published_at`.

use crate::config::ConfigError;
use crate::db::DbError;
use crate::model::blog_entry::{AuthorId, BlogEntry, BlogEntryId, ValidationErrors};
use crate::model::date_filter::PublishedSpan;
use crate::model::is_blank;
use crate::model::taxonomy::{normalize_tag, normalize_tags, Taxonomy};
use crate::repo::image_store::load_image;
use crate::repo::tag_store::load_names;
use crate::repo::{bool_to_int, ensure_schema_ready, with_savepoint};
use chrono::{DateTime, FixedOffset, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const ENTRY_SELECT_SQL: &str = "SELECT
    id,
    title,
    body,
    summary,
    permalink,
    published_at,
    visible,
    author_id
FROM blog_entries";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for entry, tag and image persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationErrors),
    Db(DbError),
    NotFound(BlogEntryId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    InvalidConfig(ConfigError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "blog entry not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "blog repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "blog repository requires table `{table}`")
            }
            Self::InvalidConfig(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid blog entry data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::InvalidConfig(err) => Some(err),
            Self::NotFound(_)
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_)
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<ValidationErrors> for RepoError {
    fn from(value: ValidationErrors) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Result ordering for entry queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EntryOrder {
    /// Newest publication first; unpublished entries last.
    #[default]
    PublishedDesc,
    PublishedAsc,
    TitleAsc,
}

impl EntryOrder {
    fn sql(self) -> &'static str {
        match self {
            Self::PublishedDesc => " ORDER BY published_at DESC, id DESC",
            Self::PublishedAsc => " ORDER BY published_at ASC, id ASC",
            Self::TitleAsc => " ORDER BY title COLLATE NOCASE ASC, id ASC",
        }
    }
}

/// Entries tagged with any of `names` under `taxonomy`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    pub taxonomy: Taxonomy,
    pub names: Vec<String>,
}

/// Composable entry query.
///
/// Every filter step is a no-op on blank input, so
/// `EntryQuery::all().by_tag("")` selects the same rows as
/// `EntryQuery::all()`. Filters combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryQuery {
    pub visible_only: bool,
    pub tagged: Vec<TagFilter>,
    pub author_id: Option<AuthorId>,
    pub text: Option<String>,
    pub published_within: Option<PublishedSpan>,
    pub exclude_ids: Vec<BlogEntryId>,
    pub order: EntryOrder,
    pub limit: Option<u32>,
}

impl EntryQuery {
    /// Every entry, visible or not.
    pub fn all() -> Self {
        Self::default()
    }

    /// Entries with `visible = true`.
    pub fn visible() -> Self {
        Self {
            visible_only: true,
            ..Self::default()
        }
    }

    pub fn by_tag(self, tag: &str) -> Self {
        self.tagged_with_name(Taxonomy::Tags, tag)
    }

    pub fn by_category(self, category: &str) -> Self {
        self.tagged_with_name(Taxonomy::Categories, category)
    }

    /// Entries sharing at least one of `names` under `taxonomy`.
    pub fn tagged_with_any(mut self, taxonomy: Taxonomy, names: &[String]) -> Self {
        let names = normalize_tags(names);
        if !names.is_empty() {
            self.tagged.push(TagFilter { taxonomy, names });
        }
        self
    }

    pub fn by_author(mut self, author_id: Option<AuthorId>) -> Self {
        if author_id.is_some() {
            self.author_id = author_id;
        }
        self
    }

    /// Case-insensitive substring match on title or body.
    pub fn by_text(mut self, text: &str) -> Self {
        if !is_blank(text) {
            self.text = Some(text.trim().to_string());
        }
        self
    }

    pub fn published_within(mut self, span: PublishedSpan) -> Self {
        self.published_within = Some(span);
        self
    }

    pub fn excluding(mut self, ids: impl IntoIterator<Item = BlogEntryId>) -> Self {
        for id in ids {
            if !self.exclude_ids.contains(&id) {
                self.exclude_ids.push(id);
            }
        }
        self
    }

    pub fn order(mut self, order: EntryOrder) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    fn tagged_with_name(mut self, taxonomy: Taxonomy, name: &str) -> Self {
        if let Some(name) = normalize_tag(name) {
            self.tagged.push(TagFilter {
                taxonomy,
                names: vec![name],
            });
        }
        self
    }

    /// Appends the WHERE clause for this query's filters.
    fn push_filters(&self, sql: &mut String, bind_values: &mut Vec<Value>) {
        sql.push_str(" WHERE 1 = 1");

        if self.visible_only {
            sql.push_str(" AND visible = 1");
        }

        for filter in &self.tagged {
            let placeholders = vec!["?"; filter.names.len()].join(", ");
            sql.push_str(&format!(
                " AND EXISTS (
                    SELECT 1
                    FROM taggings tg
                    INNER JOIN tags t ON t.id = tg.tag_id
                    WHERE tg.entry_id = blog_entries.id
                      AND tg.context = ?
                      AND t.name COLLATE NOCASE IN ({placeholders})
                )"
            ));
            bind_values.push(Value::Text(filter.taxonomy.as_str().to_string()));
            for name in &filter.names {
                bind_values.push(Value::Text(name.clone()));
            }
        }

        if let Some(author_id) = self.author_id {
            sql.push_str(" AND author_id = ?");
            bind_values.push(Value::Integer(author_id));
        }

        if let Some(text) = self.text.as_ref() {
            sql.push_str(" AND (title LIKE ? ESCAPE '\\' OR body LIKE ? ESCAPE '\\')");
            let pattern = format!("%{}%", escape_like(text));
            bind_values.push(Value::Text(pattern.clone()));
            bind_values.push(Value::Text(pattern));
        }

        if let Some(span) = self.published_within {
            sql.push_str(" AND published_at BETWEEN ? AND ?");
            bind_values.push(Value::Integer(span.start.timestamp_millis()));
            bind_values.push(Value::Integer(span.end.timestamp_millis()));
        }

        if !self.exclude_ids.is_empty() {
            let placeholders = vec!["?"; self.exclude_ids.len()].join(", ");
            sql.push_str(&format!(" AND id NOT IN ({placeholders})"));
            for id in &self.exclude_ids {
                bind_values.push(Value::Integer(*id));
            }
        }
    }
}

/// Repository interface for blog entry persistence and queries.
pub trait BlogEntryRepository {
    /// Inserts a normalized entry and returns the store-assigned id.
    fn insert_entry(&self, entry: &BlogEntry) -> RepoResult<BlogEntryId>;
    /// Updates the row for `entry.id`. A stored `permalink` or
    /// `published_at` is kept over the value in `entry`.
    fn update_entry(&self, entry: &BlogEntry) -> RepoResult<()>;
    fn get_entry(&self, id: BlogEntryId) -> RepoResult<Option<BlogEntry>>;
    fn get_by_permalink(&self, permalink: &str) -> RepoResult<Option<BlogEntry>>;
    /// Deletes the row; tag links and image cascade in storage.
    fn delete_entry(&self, id: BlogEntryId) -> RepoResult<()>;
    fn find_entries(&self, query: &EntryQuery) -> RepoResult<Vec<BlogEntry>>;
    fn count_entries(&self, query: &EntryQuery) -> RepoResult<u64>;
    /// Distinct publication years among matching entries, newest first.
    fn published_years(&self, query: &EntryQuery, offset: FixedOffset) -> RepoResult<Vec<i32>>;
    /// Distinct publication months within `year`, newest first.
    fn published_months(
        &self,
        query: &EntryQuery,
        year: i32,
        offset: FixedOffset,
    ) -> RepoResult<Vec<u32>>;
    /// Runs `work` as one unit of work on this repository's connection.
    /// Every write made by `work` on that connection is rolled back when it
    /// returns `Err`.
    fn in_transaction<T, E>(&self, work: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepoError>;
}

/// SQLite-backed blog entry repository.
pub struct SqliteBlogEntryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBlogEntryRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(
            conn,
            &["blog_entries", "tags", "taggings", "blog_entry_images"],
        )?;
        Ok(Self { conn })
    }

    fn hydrate(&self, mut entry: BlogEntry) -> RepoResult<BlogEntry> {
        let Some(id) = entry.id else {
            return Ok(entry);
        };
        for taxonomy in Taxonomy::ALL {
            entry.set_names(taxonomy, load_names(self.conn, id, taxonomy)?);
        }
        entry.image = load_image(self.conn, id)?;
        Ok(entry)
    }

    fn query_one(&self, sql: &str, bind: Value) -> RepoResult<Option<BlogEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([bind])?;
        if let Some(row) = rows.next()? {
            let entry = parse_entry_row(row)?;
            return Ok(Some(self.hydrate(entry)?));
        }
        Ok(None)
    }
}

impl BlogEntryRepository for SqliteBlogEntryRepository<'_> {
    fn insert_entry(&self, entry: &BlogEntry) -> RepoResult<BlogEntryId> {
        entry.validate(false)?;
        let permalink = required_permalink(entry)?;

        self.conn.execute(
            "INSERT INTO blog_entries (
                id,
                title,
                body,
                summary,
                permalink,
                published_at,
                visible,
                author_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                entry.id,
                entry.title.as_str(),
                entry.body.as_str(),
                entry.summary.as_deref(),
                permalink,
                entry.published_at.map(|at| at.timestamp_millis()),
                bool_to_int(entry.visible),
                entry.author_id,
            ],
        )?;

        Ok(entry.id.unwrap_or_else(|| self.conn.last_insert_rowid()))
    }

    fn update_entry(&self, entry: &BlogEntry) -> RepoResult<()> {
        entry.validate(false)?;
        let permalink = required_permalink(entry)?;
        let Some(id) = entry.id else {
            return Err(RepoError::InvalidData(
                "cannot update an entry without id".to_string(),
            ));
        };

        let changed = self.conn.execute(
            "UPDATE blog_entries
             SET
                title = ?1,
                body = ?2,
                summary = ?3,
                permalink = COALESCE(permalink, ?4),
                published_at = COALESCE(published_at, ?5),
                visible = ?6,
                author_id = ?7,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?8;",
            params![
                entry.title.as_str(),
                entry.body.as_str(),
                entry.summary.as_deref(),
                permalink,
                entry.published_at.map(|at| at.timestamp_millis()),
                bool_to_int(entry.visible),
                entry.author_id,
                id,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn get_entry(&self, id: BlogEntryId) -> RepoResult<Option<BlogEntry>> {
        self.query_one(
            &format!("{ENTRY_SELECT_SQL} WHERE id = ?1;"),
            Value::Integer(id),
        )
    }

    fn get_by_permalink(&self, permalink: &str) -> RepoResult<Option<BlogEntry>> {
        self.query_one(
            &format!("{ENTRY_SELECT_SQL} WHERE permalink = ?1 ORDER BY id ASC LIMIT 1;"),
            Value::Text(permalink.to_string()),
        )
    }

    fn delete_entry(&self, id: BlogEntryId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM blog_entries WHERE id = ?1;", [id])?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn find_entries(&self, query: &EntryQuery) -> RepoResult<Vec<BlogEntry>> {
        let mut sql = String::from(ENTRY_SELECT_SQL);
        let mut bind_values: Vec<Value> = Vec::new();
        query.push_filters(&mut sql, &mut bind_values);
        sql.push_str(query.order.sql());

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_entry_row(row)?);
        }

        entries
            .into_iter()
            .map(|entry| self.hydrate(entry))
            .collect()
    }

    fn count_entries(&self, query: &EntryQuery) -> RepoResult<u64> {
        let mut sql = String::from("SELECT COUNT(*) FROM blog_entries");
        let mut bind_values: Vec<Value> = Vec::new();
        query.push_filters(&mut sql, &mut bind_values);

        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative entry count `{count}`")))
    }

    fn published_years(&self, query: &EntryQuery, offset: FixedOffset) -> RepoResult<Vec<i32>> {
        let mut sql = String::from(
            "SELECT DISTINCT year FROM (
                SELECT CAST(strftime('%Y', published_at / 1000.0 + ?, 'unixepoch') AS INTEGER) AS year
                FROM blog_entries",
        );
        let mut bind_values = vec![Value::Integer(i64::from(offset.local_minus_utc()))];
        query.push_filters(&mut sql, &mut bind_values);
        sql.push_str(" AND published_at IS NOT NULL) ORDER BY year DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut years = Vec::new();
        while let Some(row) = rows.next()? {
            years.push(row.get::<_, i32>(0)?);
        }
        Ok(years)
    }

    fn published_months(
        &self,
        query: &EntryQuery,
        year: i32,
        offset: FixedOffset,
    ) -> RepoResult<Vec<u32>> {
        let seconds = i64::from(offset.local_minus_utc());
        let mut sql = String::from(
            "SELECT DISTINCT month FROM (
                SELECT
                    CAST(strftime('%Y', published_at / 1000.0 + ?, 'unixepoch') AS INTEGER) AS year,
                    CAST(strftime('%m', published_at / 1000.0 + ?, 'unixepoch') AS INTEGER) AS month
                FROM blog_entries",
        );
        let mut bind_values = vec![Value::Integer(seconds), Value::Integer(seconds)];
        query.push_filters(&mut sql, &mut bind_values);
        sql.push_str(" AND published_at IS NOT NULL) WHERE year = ? ORDER BY month DESC");
        bind_values.push(Value::Integer(i64::from(year)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut months = Vec::new();
        while let Some(row) = rows.next()? {
            months.push(row.get::<_, u32>(0)?);
        }
        Ok(months)
    }

    fn in_transaction<T, E>(&self, work: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepoError>,
    {
        with_savepoint(self.conn, "blog_entry_write", work)
    }
}

fn required_permalink(entry: &BlogEntry) -> RepoResult<&str> {
    match entry.permalink.as_deref() {
        Some(permalink) if !permalink.trim().is_empty() => Ok(permalink),
        _ => Err(RepoError::InvalidData(
            "permalink must be assigned before persistence".to_string(),
        )),
    }
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<BlogEntry> {
    let id: BlogEntryId = row.get("id")?;

    let published_at = match row.get::<_, Option<i64>>("published_at")? {
        Some(millis) => Some(DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid published_at value `{millis}` in blog_entries.published_at"
            ))
        })?),
        None => None,
    };

    let visible = match row.get::<_, i64>("visible")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid visible value `{other}` in blog_entries.visible"
            )));
        }
    };

    let permalink: String = row.get("permalink")?;
    if permalink.trim().is_empty() {
        return Err(RepoError::InvalidData(format!(
            "blank permalink for blog entry {id}"
        )));
    }

    Ok(BlogEntry {
        id: Some(id),
        title: row.get("title")?,
        body: row.get("body")?,
        summary: row.get("summary")?,
        permalink: Some(permalink),
        published_at,
        visible,
        author_id: row.get("author_id")?,
        tags: Vec::new(),
        categories: Vec::new(),
        image: None,
    })
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
