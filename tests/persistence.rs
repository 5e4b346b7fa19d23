//! Persistence Integration Tests
//!
//! Tests for the file gateway and library lifecycle: create, load,
//! legacy migration on load, rename and delete.

use bookshelf::adapters::{FileGateway, Gateway};
use bookshelf::core::{LibraryStore, StoreError};
use bookshelf::domain::{BookId, SummaryPatch};
use tempfile::TempDir;

fn file_store(temp: &TempDir) -> LibraryStore<FileGateway> {
    LibraryStore::new(FileGateway::new(temp.path().join("libraries")))
}

#[tokio::test]
async fn test_create_persists_empty_library() {
    let temp = TempDir::new().unwrap();
    let mut store = file_store(&temp);

    store.create_library("Romans").await.unwrap();

    let raw = store.gateway().load("Romans").await.unwrap().unwrap();
    assert_eq!(raw, serde_json::json!({"summary": [], "details": {}}));
    assert_eq!(store.list_libraries().await.unwrap(), vec!["Romans"]);
}

#[tokio::test]
async fn test_create_rejects_existing_and_invalid_names() {
    let temp = TempDir::new().unwrap();
    let mut store = file_store(&temp);
    store.create_library("Romans").await.unwrap();

    assert!(matches!(
        store.create_library("Romans").await,
        Err(StoreError::LibraryExists(_))
    ));
    assert!(matches!(
        store.create_library("  ").await,
        Err(StoreError::InvalidName(_))
    ));
    assert!(matches!(
        store.create_library("../escape").await,
        Err(StoreError::InvalidName(_))
    ));
}

#[tokio::test]
async fn test_load_missing_library_keeps_current_selection() {
    let temp = TempDir::new().unwrap();
    let mut store = file_store(&temp);
    store.create_library("Romans").await.unwrap();

    let err = store.load_library("Poésie").await.unwrap_err();

    assert!(matches!(err, StoreError::LibraryNotFound(_)));
    assert_eq!(store.current_name(), Some("Romans"));
}

#[tokio::test]
async fn test_load_migrates_legacy_file_and_writes_it_back() {
    let temp = TempDir::new().unwrap();
    let gateway = FileGateway::new(temp.path());
    std::fs::write(
        gateway.library_path("ancienne"),
        r#"[
            {"id": 7, "author": "Zola", "title": "Germinal", "description": "mine", "image": "data:image/png;base64,QUJD"},
            {"author": "Balzac", "title": "Eugénie Grandet", "comments": "poche"}
        ]"#,
    )
    .unwrap();

    let mut store = LibraryStore::new(gateway.clone());
    store.load_library("ancienne").await.unwrap();

    let library = store.library().unwrap();
    assert_eq!(library.summary[0].id, BookId::new(1));
    assert_eq!(library.summary[1].id, BookId::new(2));
    assert_eq!(library.details[&BookId::new(2)].comments, "poche");
    assert_eq!(store.active().unwrap().next_id(), BookId::new(3));

    let raw = gateway.load("ancienne").await.unwrap().unwrap();
    assert!(raw.is_object());
    assert_eq!(raw["details"]["1"]["images"][0], "data:image/png;base64,QUJD");
    assert_eq!(raw["summary"][0]["mainImage"], "data:image/png;base64,QUJD");
}

#[tokio::test]
async fn test_load_computes_next_id_from_sparse_ids() {
    let temp = TempDir::new().unwrap();
    let gateway = FileGateway::new(temp.path());
    std::fs::write(
        gateway.library_path("sparse"),
        r#"{"summary": [{"id": 4, "title": "a"}, {"id": 11, "title": "b"}], "details": {}}"#,
    )
    .unwrap();

    let mut store = LibraryStore::new(gateway);
    store.load_library("sparse").await.unwrap();

    // Loading does not re-index
    assert_eq!(store.library().unwrap().summary[1].id, BookId::new(11));
    assert_eq!(store.active().unwrap().next_id(), BookId::new(12));

    // The next structural change does
    store.add_entry().await.unwrap();
    assert!(store.library().unwrap().is_dense());
}

#[tokio::test]
async fn test_edits_survive_reload() {
    let temp = TempDir::new().unwrap();
    let mut store = file_store(&temp);
    store.create_library("Romans").await.unwrap();
    let id = store.add_entry().await.unwrap();
    store
        .update_entry(
            id,
            SummaryPatch {
                author: Some("Camus".to_string()),
                ..Default::default()
            },
            Default::default(),
        )
        .await
        .unwrap();

    let mut reopened = file_store(&temp);
    reopened.load_library("Romans").await.unwrap();

    let (summary, _) = reopened.entry(id).unwrap();
    assert_eq!(summary.author, "Camus");
}

#[tokio::test]
async fn test_rename_and_delete_library() {
    let temp = TempDir::new().unwrap();
    let mut store = file_store(&temp);
    store.create_library("Brouillon").await.unwrap();
    store.add_entry().await.unwrap();

    store.rename_library("Essais").await.unwrap();
    assert_eq!(store.current_name(), Some("Essais"));
    assert_eq!(store.list_libraries().await.unwrap(), vec!["Essais"]);

    let deleted = store.delete_library().await.unwrap();
    assert_eq!(deleted, "Essais");
    assert!(store.current_name().is_none());
    assert!(store.list_libraries().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_close_discards_unsaved_selection() {
    let temp = TempDir::new().unwrap();
    let mut store = file_store(&temp);
    store.create_library("Romans").await.unwrap();

    store.close_library();

    assert!(store.current_name().is_none());
    assert!(matches!(store.add_entry().await, Err(StoreError::NoActiveLibrary)));
    assert!(store.save_current().await.is_ok());
}
