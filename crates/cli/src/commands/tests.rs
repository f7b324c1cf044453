use super::*;
use audioshelf_database::create_test_db;
use audioshelf_library::{LibraryConfig, MemoryStorage};
use std::sync::Arc;
use tempfile::TempDir;

async fn setup() -> (LibraryManager, Arc<MemoryStorage>, TempDir) {
    let dir = TempDir::new().unwrap();
    let pool = create_test_db().await.unwrap();
    let storage = Arc::new(MemoryStorage::new());
    let config = LibraryConfig::new(dir.path().join("unused.db"), dir.path().join("media"))
        .with_export_dir(dir.path().join("exports"));
    let library = LibraryManager::with_parts(pool, storage.clone(), config);
    (library, storage, dir)
}

/// Parses a full command line and returns the top-level subcommand's matches
fn parse(args: &[&str]) -> ArgMatches {
    let mut argv = vec!["audioshelf"];
    argv.extend_from_slice(args);
    let matches = crate::build_cli().try_get_matches_from(argv).unwrap();
    let (_, sub) = matches.subcommand().unwrap();
    sub.clone()
}

#[test]
fn test_format_size() {
    assert_eq!(format_size(512), "512 bytes");
    assert_eq!(format_size(2048), "2.00 KB");
    assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
}

#[test]
fn test_open_upload_uses_file_name() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("chapter01.mp3");
    std::fs::write(&path, b"abc").unwrap();

    let (name, mut reader) = open_upload(&path).unwrap();
    let mut content = Vec::new();
    reader.read_to_end(&mut content).unwrap();

    assert_eq!(name, "chapter01.mp3");
    assert_eq!(content, b"abc");
}

#[test]
fn test_open_upload_missing_file() {
    let dir = TempDir::new().unwrap();
    assert!(open_upload(&dir.path().join("nope.mp3")).is_err());
}

#[tokio::test]
async fn test_init_creates_media_root() {
    let (library, _storage, dir) = setup().await;
    init(&library).await.unwrap();
    assert!(dir.path().join("media").is_dir());
}

#[tokio::test]
async fn test_book_add_resolves_slugs() {
    let (library, _storage, _dir) = setup().await;
    author(&library, &parse(&["author", "add", "Frank", "Herbert"]))
        .await
        .unwrap();
    series(&library, &parse(&["series", "add", "Dune Saga"]))
        .await
        .unwrap();
    genre(&library, &parse(&["genre", "add", "Science Fiction"]))
        .await
        .unwrap();

    book(
        &library,
        &parse(&[
            "book",
            "add",
            "Dune",
            "-a",
            "herbert_frank",
            "-s",
            "dune_saga",
            "-g",
            "science_fiction",
        ]),
    )
    .await
    .unwrap();

    let details = library
        .book_details("herbert_frank_dune_saga_dune")
        .await
        .unwrap();
    assert_eq!(details.authors.len(), 1);
    assert_eq!(details.genres[0].slug, "science_fiction");
    assert_eq!(details.series.unwrap().slug, "dune_saga");
}

#[tokio::test]
async fn test_book_add_unknown_author_fails() {
    let (library, _storage, _dir) = setup().await;
    let result = book(&library, &parse(&["book", "add", "Dune", "-a", "nobody"])).await;
    assert!(result.is_err());
    assert!(library.list_books().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_and_series_rename_moves_files() {
    let (library, storage, dir) = setup().await;
    series(&library, &parse(&["series", "add", "Earthsea"]))
        .await
        .unwrap();
    book(
        &library,
        &parse(&["book", "add", "Tehanu", "--series", "earthsea"]),
    )
    .await
    .unwrap();

    let track = dir.path().join("01.mp3");
    std::fs::write(&track, b"audio").unwrap();
    audio(
        &library,
        &parse(&[
            "audio",
            "upload",
            "no_author_earthsea_tehanu",
            track.to_str().unwrap(),
        ]),
    )
    .await
    .unwrap();

    series(
        &library,
        &parse(&["series", "rename", "earthsea", "Earthsea Cycle"]),
    )
    .await
    .unwrap();

    assert_eq!(
        storage.files().unwrap(),
        vec!["audio/no_author/earthsea_cycle/no_author_earthsea_cycle_tehanu/01.mp3"]
    );
}

#[tokio::test]
async fn test_read_flag_toggles() {
    let (library, _storage, _dir) = setup().await;
    let created = library.create_book(NewBook::new("Emma")).await.unwrap();

    book(&library, &parse(&["book", "read", &created.slug]))
        .await
        .unwrap();
    assert!(library.get_book(created.id).await.unwrap().is_read);

    book(&library, &parse(&["book", "read", &created.slug, "--unread"]))
        .await
        .unwrap();
    assert!(!library.get_book(created.id).await.unwrap().is_read);
}

#[tokio::test]
async fn test_forced_delete_skips_prompt() {
    let (library, _storage, _dir) = setup().await;
    let created = library.create_book(NewBook::new("Emma")).await.unwrap();

    book(&library, &parse(&["book", "delete", &created.slug, "--force"]))
        .await
        .unwrap();

    assert!(library.list_books().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_audio_rejects_bad_id() {
    let (library, _storage, _dir) = setup().await;
    let result = audio(&library, &parse(&["audio", "delete", "not-a-uuid"])).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_archive_writes_output() {
    let (library, _storage, dir) = setup().await;
    let created = library.create_book(NewBook::new("Emma")).await.unwrap();
    library
        .upload_audio(created.id, "01.mp3", Box::new(&b"one"[..]))
        .await
        .unwrap();

    let output = dir.path().join("emma.zip");
    archive(
        &library,
        &parse(&["archive", &created.slug, "-o", output.to_str().unwrap()]),
    )
    .await
    .unwrap();

    assert!(std::fs::metadata(&output).unwrap().len() > 0);
}

#[tokio::test]
async fn test_export_writes_into_export_dir() {
    let (library, _storage, dir) = setup().await;
    library.create_author("Jane", "Austen", "").await.unwrap();

    export(&library, &parse(&["export", "authors"])).await.unwrap();

    let written: Vec<_> = std::fs::read_dir(dir.path().join("exports"))
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(written.len(), 1);
    assert!(written[0].starts_with("authors_list_"));
}

#[tokio::test]
async fn test_show_stats_on_empty_catalog() {
    let (library, _storage, _dir) = setup().await;
    show_stats(&library).await.unwrap();
}

#[tokio::test]
async fn test_unknown_slug_is_an_error() {
    let (library, _storage, _dir) = setup().await;
    assert!(book(&library, &parse(&["book", "info", "missing"])).await.is_err());
    assert!(genre(&library, &parse(&["genre", "delete", "missing"])).await.is_err());
}
