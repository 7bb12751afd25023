use chrono::{Duration, TimeZone, Utc};
use rusqlite::Connection;
use storeblog_core::db::open_db_in_memory;
use storeblog_core::{
    AuthorConfig, BlogConfig, BlogEntry, BlogEntryId, BlogEntryRepository,
    BlogEntryValidationError, BlogService, BlogServiceError, EntryImage, ImageStore, RepoError,
    RepoResult, SlugGenerator, SqliteAuthorRepository, SqliteBlogEntryRepository,
    SqliteBlogService, SqliteTagStore, Taxonomy,
};

fn service(conn: &Connection) -> SqliteBlogService<'_> {
    SqliteBlogService::open(conn, BlogConfig::default()).unwrap()
}

#[test]
fn save_assigns_id_permalink_and_publish_time() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 9, 30, 0).unwrap();

    let mut entry = BlogEntry::new("Spring Collection", "New arrivals are here.");
    entry.visible = true;
    let id = service.save_at(&mut entry, now).unwrap();

    assert_eq!(entry.id, Some(id));
    assert_eq!(entry.permalink.as_deref(), Some("spring-collection"));
    assert_eq!(entry.published_at, Some(now));

    let loaded = service.find_entry(id).unwrap();
    assert_eq!(loaded, entry);
}

#[test]
fn hidden_entry_has_no_publish_time_until_shown() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let draft_time = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let publish_time = draft_time + Duration::days(3);

    let mut entry = BlogEntry::new("Draft", "Work in progress");
    service.save_at(&mut entry, draft_time).unwrap();
    assert_eq!(entry.published_at, None);

    entry.visible = true;
    service.save_at(&mut entry, publish_time).unwrap();
    assert_eq!(entry.published_at, Some(publish_time));
}

#[test]
fn published_at_latches_across_later_saves_and_visibility_toggles() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let first = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();

    let mut entry = BlogEntry::new("Latch", "Body");
    entry.visible = true;
    let id = service.save_at(&mut entry, first).unwrap();

    entry.visible = false;
    service.save_at(&mut entry, first + Duration::days(1)).unwrap();
    entry.visible = true;
    service.save_at(&mut entry, first + Duration::days(2)).unwrap();

    let loaded = service.find_entry(id).unwrap();
    assert_eq!(loaded.published_at, Some(first));
}

#[test]
fn permalink_survives_title_changes() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let mut entry = BlogEntry::new("Original Title", "Body");
    let id = service.save(&mut entry).unwrap();

    entry.title = "Completely Different".to_string();
    service.save(&mut entry).unwrap();

    let loaded = service.find_entry(id).unwrap();
    assert_eq!(loaded.title, "Completely Different");
    assert_eq!(loaded.permalink.as_deref(), Some("original-title"));
    assert_eq!(service.find_by_permalink("original-title").unwrap().id, Some(id));
    assert!(service
        .get_by_permalink("completely-different")
        .unwrap()
        .is_none());
}

#[test]
fn explicit_permalink_is_kept() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let mut entry = BlogEntry::new("Title", "Body");
    entry.permalink = Some("custom-path".to_string());
    service.save(&mut entry).unwrap();

    assert_eq!(entry.permalink.as_deref(), Some("custom-path"));
}

#[test]
fn custom_slug_generator_is_used() {
    struct Upper;
    impl SlugGenerator for Upper {
        fn slugify(&self, text: &str) -> String {
            text.to_uppercase().replace(' ', "_")
        }
    }

    let conn = open_db_in_memory().unwrap();
    let service = service(&conn).with_slug_generator(Upper);

    let mut entry = BlogEntry::new("Big News", "Body");
    service.save(&mut entry).unwrap();
    assert_eq!(entry.permalink.as_deref(), Some("BIG_NEWS"));
}

#[test]
fn rejected_save_leaves_entry_and_store_untouched() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let mut entry = BlogEntry::new("Has a title", "<br>");
    entry.visible = true;
    let err = service.save(&mut entry).unwrap_err();

    match err {
        BlogServiceError::Validation(errors) => {
            assert_eq!(errors.errors(), &[BlogEntryValidationError::PlaceholderBody]);
            assert_eq!(errors.messages_for("body"), vec!["body can't be blank"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(entry.id, None);
    assert_eq!(entry.permalink, None);
    assert_eq!(entry.published_at, None);
    assert!(service.visible(Default::default()).unwrap().is_empty());
}

#[test]
fn tags_and_categories_are_persisted_per_taxonomy() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let mut entry = BlogEntry::new("Tagged", "Body");
    entry.tags = vec!["Rust".to_string(), "SQLite".to_string()];
    entry.categories = vec!["Engineering".to_string()];
    let id = service.save(&mut entry).unwrap();

    let loaded = service.find_entry(id).unwrap();
    assert_eq!(loaded.tags, vec!["Rust".to_string(), "SQLite".to_string()]);
    assert_eq!(loaded.categories, vec!["Engineering".to_string()]);

    // An existing tag keeps the spelling of its first use.
    entry.tags = vec!["rust".to_string()];
    service.save(&mut entry).unwrap();
    let reloaded = service.find_entry(id).unwrap();
    assert_eq!(reloaded.tags, vec!["Rust".to_string()]);
    assert_eq!(reloaded.categories, vec!["Engineering".to_string()]);

    assert_eq!(
        service.list_tags(Taxonomy::Tags).unwrap(),
        vec!["Rust".to_string()]
    );
    assert_eq!(
        service.list_tags(Taxonomy::Categories).unwrap(),
        vec!["Engineering".to_string()]
    );
    assert_eq!(service.by_tag("RUST").unwrap().len(), 1);
}

#[test]
fn image_is_attached_replaced_and_destroyed_with_entry() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let mut entry = BlogEntry::new("Pictured", "Body");
    entry.image = Some(EntryImage {
        file_name: "first.jpg".to_string(),
        content_type: Some("image/jpeg".to_string()),
        file_size: Some(1024),
        alt: Some("First".to_string()),
    });
    entry.tags = vec!["photo".to_string()];
    let id = service.save(&mut entry).unwrap();
    assert_eq!(
        service.find_entry(id).unwrap().image.unwrap().file_name,
        "first.jpg"
    );

    entry.image = Some(EntryImage::new("second.png"));
    service.save(&mut entry).unwrap();
    let image = service.find_entry(id).unwrap().image.unwrap();
    assert_eq!(image.file_name, "second.png");
    assert_eq!(image.content_type, None);

    service.destroy(id).unwrap();
    assert!(service.get(id).unwrap().is_none());
    assert_eq!(count_rows(&conn, "blog_entry_images"), 0);
    assert_eq!(count_rows(&conn, "taggings"), 0);
    assert!(service.entry_ids_tagged(Taxonomy::Tags, "photo").unwrap().is_empty());
}

#[test]
fn require_image_rejects_entries_without_attachment() {
    let conn = open_db_in_memory().unwrap();
    let config = BlogConfig {
        require_image: true,
        ..BlogConfig::default()
    };
    let service = SqliteBlogService::open(&conn, config).unwrap();

    let mut entry = BlogEntry::new("Needs image", "Body");
    entry.image = Some(EntryImage::new(""));
    let err = service.save(&mut entry).unwrap_err();
    assert!(matches!(
        err,
        BlogServiceError::Validation(ref errors)
            if errors.contains(BlogEntryValidationError::MissingImage)
    ));

    entry.image = Some(EntryImage::new("hero.webp"));
    assert!(service.save(&mut entry).is_ok());
}

#[test]
fn missing_entries_surface_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    assert!(matches!(
        service.find_entry(42),
        Err(BlogServiceError::EntryNotFound(42))
    ));
    assert!(matches!(
        service.destroy(42),
        Err(BlogServiceError::EntryNotFound(42))
    ));
    assert!(matches!(
        service.find_by_permalink("nope"),
        Err(BlogServiceError::PermalinkNotFound(_))
    ));

    let mut ghost = BlogEntry::new("Ghost", "Body");
    ghost.id = Some(99);
    ghost.permalink = Some("ghost".to_string());
    assert!(matches!(
        service.save(&mut ghost),
        Err(BlogServiceError::EntryNotFound(99))
    ));
}

#[test]
fn author_is_resolved_through_configured_table() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO users (email, name, surname, nickname) VALUES ('ed@example.com', 'Eda', 'Kim', 'eda');",
        [],
    )
    .unwrap();
    let author_id = conn.last_insert_rowid();

    let config = BlogConfig {
        author: AuthorConfig {
            name_column: "name".to_string(),
            ..AuthorConfig::default()
        },
        ..BlogConfig::default()
    };
    let service = SqliteBlogService::open(&conn, config).unwrap();

    let mut entry = BlogEntry::new("By Eda", "Body");
    entry.author_id = Some(author_id);
    service.save(&mut entry).unwrap();

    let author = service.author_of(&entry).unwrap().unwrap();
    assert_eq!(author.id, author_id);
    assert_eq!(author.display_name.as_deref(), Some("Eda"));

    let anonymous = BlogEntry::new("Anon", "Body");
    assert_eq!(service.author_of(&anonymous).unwrap(), None);
}

#[test]
fn invalid_author_table_is_rejected_at_construction() {
    let conn = open_db_in_memory().unwrap();
    let config = BlogConfig {
        author: AuthorConfig {
            table: "users--".to_string(),
            ..AuthorConfig::default()
        },
        ..BlogConfig::default()
    };

    let err = SqliteBlogService::open(&conn, config).err().unwrap();
    assert!(matches!(err, BlogServiceError::Config(_)));
}

fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| row.get(0))
        .unwrap()
}

#[test]
fn image_without_file_name_is_rejected_before_anything_is_written() {
    let conn = open_db_in_memory().unwrap();
    let config = BlogConfig {
        require_image: true,
        ..BlogConfig::default()
    };
    let service = SqliteBlogService::open(&conn, config).unwrap();

    let mut entry = BlogEntry::new("Alt text only", "Body");
    entry.image = Some(EntryImage {
        alt: Some("Shop window".to_string()),
        ..EntryImage::new("")
    });
    let err = service.save(&mut entry).unwrap_err();

    assert!(matches!(
        err,
        BlogServiceError::Validation(ref errors)
            if errors.contains(BlogEntryValidationError::BlankImageFileName)
    ));
    assert_eq!(entry.id, None);
    assert_eq!(count_rows(&conn, "blog_entries"), 0);
}

struct BrokenImageStore;

impl ImageStore for BrokenImageStore {
    fn attach(&self, _entry_id: BlogEntryId, _image: &EntryImage) -> RepoResult<()> {
        Err(RepoError::InvalidData("image service unavailable".to_string()))
    }

    fn image_for(&self, _entry_id: BlogEntryId) -> RepoResult<Option<EntryImage>> {
        Ok(None)
    }

    fn destroy_for(&self, _entry_id: BlogEntryId) -> RepoResult<bool> {
        Ok(false)
    }
}

#[test]
fn failed_image_attach_rolls_back_row_and_tags() {
    let conn = open_db_in_memory().unwrap();
    let service = BlogService::new(
        SqliteBlogEntryRepository::try_new(&conn).unwrap(),
        SqliteTagStore::try_new(&conn).unwrap(),
        BrokenImageStore,
        SqliteAuthorRepository::try_new(&conn, &AuthorConfig::default()).unwrap(),
        BlogConfig::default(),
    )
    .unwrap();

    let mut entry = BlogEntry::new("Broken upload", "Body");
    entry.visible = true;
    entry.tags = vec!["sale".to_string()];
    entry.image = Some(EntryImage::new("hero.jpg"));
    let err = service.save(&mut entry).unwrap_err();

    assert!(matches!(err, BlogServiceError::Repo(RepoError::InvalidData(_))));
    assert_eq!(entry.id, None);
    assert_eq!(entry.permalink, None);
    assert_eq!(count_rows(&conn, "blog_entries"), 0);
    assert_eq!(count_rows(&conn, "taggings"), 0);
    assert_eq!(count_rows(&conn, "tags"), 0);

    // The connection is usable again and a retry stores exactly one row.
    entry.image = None;
    service.save(&mut entry).unwrap();
    assert_eq!(count_rows(&conn, "blog_entries"), 1);
}

#[test]
fn update_cannot_clear_stored_publish_time() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let mut entry = BlogEntry::new("Launch", "Body");
    entry.visible = true;
    let id = service.save_at(&mut entry, first).unwrap();

    let mut edited = service.find_entry(id).unwrap();
    edited.visible = false;
    edited.published_at = None;
    service
        .save_at(&mut edited, first + Duration::days(30))
        .unwrap();

    assert_eq!(edited.published_at, Some(first));
    assert_eq!(service.find_entry(id).unwrap().published_at, Some(first));
}

#[test]
fn update_cannot_replace_stored_permalink() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let mut entry = BlogEntry::new("Launch Day", "Body");
    let id = service.save(&mut entry).unwrap();

    entry.permalink = Some("other".to_string());
    service.save(&mut entry).unwrap();

    assert_eq!(entry.permalink.as_deref(), Some("launch-day"));
    assert_eq!(
        service.find_entry(id).unwrap().permalink.as_deref(),
        Some("launch-day")
    );
    assert!(service.get_by_permalink("other").unwrap().is_none());
}

#[test]
fn repository_update_keeps_stored_permalink_and_publish_time() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteBlogEntryRepository::try_new(&conn).unwrap();
    let published = Utc.with_ymd_and_hms(2023, 7, 4, 12, 0, 0).unwrap();

    let mut entry = BlogEntry::new("Direct", "Body");
    entry.permalink = Some("direct".to_string());
    entry.published_at = Some(published);
    entry.visible = true;
    let id = repo.insert_entry(&entry).unwrap();

    entry.id = Some(id);
    entry.permalink = Some("rewritten".to_string());
    entry.published_at = None;
    entry.title = "Direct, edited".to_string();
    repo.update_entry(&entry).unwrap();

    let stored = repo.get_entry(id).unwrap().unwrap();
    assert_eq!(stored.title, "Direct, edited");
    assert_eq!(stored.permalink.as_deref(), Some("direct"));
    assert_eq!(stored.published_at, Some(published));
}
