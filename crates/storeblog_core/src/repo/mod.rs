//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for entries, tag links
//!   and image attachments.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Entry writes enforce the base `BlogEntry::validate()` rules before
//!   persistence.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.
//! - Multi-statement writes run under a savepoint, so they nest inside a
//!   service-level unit of work on the same connection.

pub mod author_repo;
pub mod entry_repo;
pub mod image_store;
pub mod tag_store;

use crate::db::migrations::latest_version;
use entry_repo::{RepoError, RepoResult};
use log::warn;
use rusqlite::Connection;

/// Rejects connections that were not opened through `db::open_db*`.
pub(crate) fn ensure_schema_ready(conn: &Connection, tables: &[&'static str]) -> RepoResult<()> {
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in tables {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

/// Runs `work` under the savepoint `name`, releasing it on success and
/// rolling back to it on failure. Opens a transaction when none is active.
pub(crate) fn with_savepoint<T, E>(
    conn: &Connection,
    name: &'static str,
    work: impl FnOnce() -> Result<T, E>,
) -> Result<T, E>
where
    E: From<RepoError>,
{
    conn.execute_batch(&format!("SAVEPOINT {name};"))
        .map_err(RepoError::from)?;

    match work() {
        Ok(value) => match conn.execute_batch(&format!("RELEASE {name};")) {
            Ok(()) => Ok(value),
            Err(err) => {
                rollback_savepoint(conn, name);
                Err(RepoError::from(err).into())
            }
        },
        Err(err) => {
            rollback_savepoint(conn, name);
            Err(err)
        }
    }
}

fn rollback_savepoint(conn: &Connection, name: &'static str) {
    if let Err(err) = conn.execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name};")) {
        warn!("event=savepoint_rollback module=repo status=error savepoint={name} error={err}");
    }
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
