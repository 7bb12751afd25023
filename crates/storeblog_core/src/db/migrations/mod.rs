//! Blog schema migration chain.
//!
//! 1. `blog_entries` plus the host `users` table entries point at.
//! 2. `tags` / `taggings`, shared by both taxonomies.
//! 3. `blog_entry_images`, the one-to-one attachment record.
//! 4. Author lookup indexes on `users` name columns.
//!
//! Pending migrations apply in one transaction; a failure leaves the store
//! at its previous version.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "blog_entries",
        sql: include_str!("0001_blog_entries.sql"),
    },
    Migration {
        version: 2,
        name: "taggings",
        sql: include_str!("0002_taggings.sql"),
    },
    Migration {
        version: 3,
        name: "blog_entry_images",
        sql: include_str!("0003_blog_entry_images.sql"),
    },
    Migration {
        version: 4,
        name: "user_name_indexes",
        sql: include_str!("0004_user_name_indexes.sql"),
    },
];

/// Schema version the newest blog migration leaves behind.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Brings the blog store up to [`latest_version`].
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the store is ahead of this build.
/// - `MigrationFailed` naming the first migration that did not apply.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        tx.execute_batch(migration.sql)
            .and_then(|()| {
                tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
            })
            .map_err(|source| {
                error!(
                    "event=db_migrate module=db status=error version={} name={} error={}",
                    migration.version, migration.name, source
                );
                DbError::MigrationFailed {
                    version: migration.version,
                    name: migration.name,
                    source,
                }
            })?;
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;
    info!(
        "event=db_migrate module=db status=complete from_version={current_version} to_version={latest}"
    );

    Ok(())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
