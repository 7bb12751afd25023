use rusqlite::Connection;
use storeblog_core::db::migrations::latest_version;
use storeblog_core::db::{open_db, open_db_in_memory, DbError};
use storeblog_core::{RepoError, SqliteBlogEntryRepository};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in ["users", "blog_entries", "tags", "taggings", "blog_entry_images"] {
        assert_sqlite_object_exists(&conn, "table", table);
    }
}

#[test]
fn user_name_indexes_are_created_non_unique() {
    let conn = open_db_in_memory().unwrap();

    for index in [
        "index_users_on_name",
        "index_users_on_surname",
        "index_users_on_nickname",
    ] {
        assert_sqlite_object_exists(&conn, "index", index);
    }

    conn.execute_batch(
        "INSERT INTO users (email, name, surname, nickname) VALUES ('a@example.com', 'Ann', 'Lee', 'ann');
         INSERT INTO users (email, name, surname, nickname) VALUES ('b@example.com', 'Ann', 'Lee', 'ann');",
    )
    .unwrap();
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blog.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_sqlite_object_exists(&conn_second, "table", "blog_entries");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn failed_migration_is_named_and_leaves_version_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.db");

    // A host `users` table without the name columns the index migration needs.
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL);
         PRAGMA user_version = 3;",
    )
    .unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::MigrationFailed { version, name, .. } => {
            assert_eq!(version, 4);
            assert_eq!(name, "user_name_indexes");
        }
        other => panic!("unexpected error: {other}"),
    }
    let message = open_db(&path).unwrap_err().to_string();
    assert!(message.contains("0004_user_name_indexes"), "{message}");

    let conn = Connection::open(&path).unwrap();
    assert_eq!(schema_version(&conn), 3);
}

#[test]
fn repository_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();

    let err = SqliteBlogEntryRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_sqlite_object_exists(conn: &Connection, kind: &str, name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = ?1 AND name = ?2
            );",
            [kind, name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "{kind} {name} does not exist");
}
