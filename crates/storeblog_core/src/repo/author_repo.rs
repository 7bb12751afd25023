//! Author lookup against the host-configured user table.

use crate::config::AuthorConfig;
use crate::model::blog_entry::AuthorId;
use crate::repo::entry_repo::{RepoError, RepoResult};
use rusqlite::{Connection, OptionalExtension};

/// Author row as seen by the blog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorRecord {
    pub id: AuthorId,
    pub display_name: Option<String>,
}

pub trait AuthorRepository {
    fn find_author(&self, id: AuthorId) -> RepoResult<Option<AuthorRecord>>;
}

/// Reads authors from the table named in [`AuthorConfig`].
pub struct SqliteAuthorRepository<'conn> {
    conn: &'conn Connection,
    select_sql: String,
}

impl<'conn> SqliteAuthorRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, config: &AuthorConfig) -> RepoResult<Self> {
        config.validate().map_err(RepoError::InvalidConfig)?;
        let select_sql = format!(
            "SELECT {id}, {name} FROM {table} WHERE {id} = ?1;",
            id = config.id_column,
            name = config.name_column,
            table = config.table,
        );
        Ok(Self { conn, select_sql })
    }
}

impl AuthorRepository for SqliteAuthorRepository<'_> {
    fn find_author(&self, id: AuthorId) -> RepoResult<Option<AuthorRecord>> {
        let author = self
            .conn
            .query_row(&self.select_sql, [id], |row| {
                Ok(AuthorRecord {
                    id: row.get(0)?,
                    display_name: row.get(1)?,
                })
            })
            .optional()?;
        Ok(author)
    }
}
