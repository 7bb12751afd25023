//! Taxonomy-scoped tag links and SQLite implementation.
//!
//! # Responsibility
//! - Own tag-link replacement for one entry and taxonomy.
//! - Answer "which entries carry this tag" lookups.
//!
//! # Invariants
//! - `tag` replaces the whole set for one taxonomy atomically (a savepoint,
//!   nestable in the caller's unit of work) and leaves the other taxonomy
//!   untouched.
//! - Tag names keep the case of their first use; matching ignores case.

use crate::model::blog_entry::BlogEntryId;
use crate::model::taxonomy::{normalize_tag, normalize_tags, Taxonomy};
use crate::repo::{ensure_schema_ready, with_savepoint};
use crate::repo::entry_repo::{RepoError, RepoResult};
use rusqlite::{params, Connection};
use std::collections::BTreeSet;

/// Tag-link storage parameterized by taxonomy.
pub trait TagStore {
    /// Replaces the entry's tag set under `taxonomy`.
    fn tag(&self, entry_id: BlogEntryId, taxonomy: Taxonomy, tags: &[String]) -> RepoResult<()>;
    /// Ids of entries carrying `tag` under `taxonomy`. Blank tags match none.
    fn find_by_tag(&self, taxonomy: Taxonomy, tag: &str) -> RepoResult<BTreeSet<BlogEntryId>>;
    /// Tag names for one entry, sorted.
    fn tags_for(&self, entry_id: BlogEntryId, taxonomy: Taxonomy) -> RepoResult<Vec<String>>;
    /// Every tag name in use under `taxonomy`, sorted.
    fn list_tags(&self, taxonomy: Taxonomy) -> RepoResult<Vec<String>>;
}

/// SQLite-backed tag store over `tags` + `taggings`.
pub struct SqliteTagStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTagStore<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, &["blog_entries", "tags", "taggings"])?;
        Ok(Self { conn })
    }
}

impl TagStore for SqliteTagStore<'_> {
    fn tag(&self, entry_id: BlogEntryId, taxonomy: Taxonomy, tags: &[String]) -> RepoResult<()> {
        let normalized = normalize_tags(tags);
        with_savepoint(self.conn, "tagging_replace", || {
            if !entry_exists(self.conn, entry_id)? {
                return Err(RepoError::NotFound(entry_id));
            }

            self.conn.execute(
                "DELETE FROM taggings WHERE entry_id = ?1 AND context = ?2;",
                params![entry_id, taxonomy.as_str()],
            )?;

            for tag in &normalized {
                self.conn.execute(
                    "INSERT OR IGNORE INTO tags (name) VALUES (?1);",
                    [tag.as_str()],
                )?;
                self.conn.execute(
                    "INSERT INTO taggings (tag_id, entry_id, context)
                     SELECT id, ?1, ?2
                     FROM tags
                     WHERE name = ?3 COLLATE NOCASE;",
                    params![entry_id, taxonomy.as_str(), tag.as_str()],
                )?;
            }

            Ok(())
        })
    }

    fn find_by_tag(&self, taxonomy: Taxonomy, tag: &str) -> RepoResult<BTreeSet<BlogEntryId>> {
        let Some(tag) = normalize_tag(tag) else {
            return Ok(BTreeSet::new());
        };

        let mut stmt = self.conn.prepare(
            "SELECT tg.entry_id
             FROM taggings tg
             INNER JOIN tags t ON t.id = tg.tag_id
             WHERE tg.context = ?1
               AND t.name = ?2 COLLATE NOCASE;",
        )?;
        let mut rows = stmt.query(params![taxonomy.as_str(), tag])?;
        let mut ids = BTreeSet::new();
        while let Some(row) = rows.next()? {
            ids.insert(row.get::<_, BlogEntryId>(0)?);
        }
        Ok(ids)
    }

    fn tags_for(&self, entry_id: BlogEntryId, taxonomy: Taxonomy) -> RepoResult<Vec<String>> {
        load_names(self.conn, entry_id, taxonomy)
    }

    fn list_tags(&self, taxonomy: Taxonomy) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT t.name
             FROM tags t
             INNER JOIN taggings tg ON tg.tag_id = t.id
             WHERE tg.context = ?1
             ORDER BY t.name COLLATE NOCASE ASC;",
        )?;
        let mut rows = stmt.query([taxonomy.as_str()])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(row.get(0)?);
        }
        Ok(tags)
    }
}

/// Loads one entry's tag names under `taxonomy`, sorted.
pub(crate) fn load_names(
    conn: &Connection,
    entry_id: BlogEntryId,
    taxonomy: Taxonomy,
) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT t.name
         FROM taggings tg
         INNER JOIN tags t ON t.id = tg.tag_id
         WHERE tg.entry_id = ?1
           AND tg.context = ?2
         ORDER BY t.name COLLATE NOCASE ASC;",
    )?;
    let mut rows = stmt.query(params![entry_id, taxonomy.as_str()])?;
    let mut names = Vec::new();
    while let Some(row) = rows.next()? {
        names.push(row.get(0)?);
    }
    Ok(names)
}

fn entry_exists(conn: &Connection, entry_id: BlogEntryId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM blog_entries WHERE id = ?1);",
        [entry_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
