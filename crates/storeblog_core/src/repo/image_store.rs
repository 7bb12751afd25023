//! One-to-one image attachment records.
//!
//! The attachment row is owned by its entry: it is replaced on re-attach and
//! removed with the entry.

use crate::model::blog_entry::{BlogEntryId, EntryImage};
use crate::repo::ensure_schema_ready;
use crate::repo::entry_repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};

/// Attachment storage for entry images.
pub trait ImageStore {
    /// Attaches `image` to the entry, replacing any previous attachment.
    fn attach(&self, entry_id: BlogEntryId, image: &EntryImage) -> RepoResult<()>;
    fn image_for(&self, entry_id: BlogEntryId) -> RepoResult<Option<EntryImage>>;
    /// Removes the attachment. Returns whether one existed.
    fn destroy_for(&self, entry_id: BlogEntryId) -> RepoResult<bool>;
}

/// SQLite-backed attachment store over `blog_entry_images`.
pub struct SqliteImageStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteImageStore<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, &["blog_entries", "blog_entry_images"])?;
        Ok(Self { conn })
    }
}

impl ImageStore for SqliteImageStore<'_> {
    fn attach(&self, entry_id: BlogEntryId, image: &EntryImage) -> RepoResult<()> {
        if image.file_name.trim().is_empty() {
            return Err(RepoError::InvalidData(
                "image attachment requires a file name".to_string(),
            ));
        }

        let result = self.conn.execute(
            "INSERT INTO blog_entry_images (entry_id, file_name, content_type, file_size, alt)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (entry_id) DO UPDATE SET
                file_name = excluded.file_name,
                content_type = excluded.content_type,
                file_size = excluded.file_size,
                alt = excluded.alt;",
            params![
                entry_id,
                image.file_name.as_str(),
                image.content_type.as_deref(),
                image.file_size,
                image.alt.as_deref(),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(RepoError::NotFound(entry_id))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn image_for(&self, entry_id: BlogEntryId) -> RepoResult<Option<EntryImage>> {
        load_image(self.conn, entry_id)
    }

    fn destroy_for(&self, entry_id: BlogEntryId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM blog_entry_images WHERE entry_id = ?1;",
            [entry_id],
        )?;
        Ok(changed > 0)
    }
}

pub(crate) fn load_image(conn: &Connection, entry_id: BlogEntryId) -> RepoResult<Option<EntryImage>> {
    let image = conn
        .query_row(
            "SELECT file_name, content_type, file_size, alt
             FROM blog_entry_images
             WHERE entry_id = ?1;",
            [entry_id],
            |row| {
                Ok(EntryImage {
                    file_name: row.get("file_name")?,
                    content_type: row.get("content_type")?,
                    file_size: row.get("file_size")?,
                    alt: row.get("alt")?,
                })
            },
        )
        .optional()?;
    Ok(image)
}
