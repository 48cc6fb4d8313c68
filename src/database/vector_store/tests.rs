use tempfile::TempDir;

use super::*;
use crate::database::EmbeddingRecord;

fn test_record(content: &str, source: &str, vector: Vec<f32>) -> EmbeddingRecord {
    EmbeddingRecord::new(
        vector,
        DocumentChunk {
            content: content.to_string(),
            metadata: DocumentMetadata {
                source: source.to_string(),
                file_path: PathBuf::from(format!("data/documents/{}", source)),
            },
            chunk_index: 0,
        },
    )
}

#[tokio::test]
async fn fresh_store_is_empty() {
    let dir = TempDir::new().expect("should create temp dir");

    let store = VectorStore::create(dir.path())
        .await
        .expect("should create store");

    assert_eq!(store.count().await.expect("should count"), 0);
    assert!(
        store
            .search(&[0.0, 0.0, 0.0], 5)
            .await
            .expect("should search")
            .is_empty()
    );
}

#[tokio::test]
async fn stores_and_counts_entries() {
    let dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::create(dir.path())
        .await
        .expect("should create store");

    let records = vec![
        test_record("first", "a.txt", vec![1.0, 0.0, 0.0]),
        test_record("second", "a.txt", vec![0.0, 1.0, 0.0]),
        test_record("third", "b.txt", vec![0.0, 0.0, 1.0]),
    ];

    store
        .add_records(records)
        .await
        .expect("should store records");

    assert_eq!(store.count().await.expect("should count"), 3);
}

#[tokio::test]
async fn search_returns_nearest_first() {
    let dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::create(dir.path())
        .await
        .expect("should create store");

    store
        .add_records(vec![
            test_record("about cats", "cats.txt", vec![1.0, 0.0, 0.0]),
            test_record("about dogs", "dogs.txt", vec![0.0, 1.0, 0.0]),
            test_record("about fish", "fish.txt", vec![0.0, 0.0, 1.0]),
        ])
        .await
        .expect("should store records");

    let results = store
        .search(&[0.9, 0.1, 0.0], 2)
        .await
        .expect("should search");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].chunk.metadata.source, "cats.txt");
    assert_eq!(results[1].chunk.metadata.source, "dogs.txt");
    assert!(results[0].distance <= results[1].distance);
}

#[tokio::test]
async fn rejects_mismatched_vector_width() {
    let dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::create(dir.path())
        .await
        .expect("should create store");

    store
        .add_records(vec![test_record("first", "a.txt", vec![1.0, 0.0, 0.0])])
        .await
        .expect("should store records");

    let result = store
        .add_records(vec![test_record("second", "a.txt", vec![1.0, 0.0])])
        .await;

    assert!(matches!(result, Err(AgentError::Database(_))));
}

#[tokio::test]
async fn open_fails_for_missing_path() {
    let dir = TempDir::new().expect("should create temp dir");
    let missing = dir.path().join("nope");

    let result = VectorStore::open(&missing).await;
    assert!(matches!(result, Err(AgentError::NotFound(_))));
}

#[tokio::test]
async fn open_fails_for_directory_without_index() {
    let dir = TempDir::new().expect("should create temp dir");

    let result = VectorStore::open(dir.path()).await;
    assert!(matches!(result, Err(AgentError::NotFound(_))));
}

#[tokio::test]
async fn reopened_store_preserves_entries_and_search_order() {
    let dir = TempDir::new().expect("should create temp dir");

    {
        let mut store = VectorStore::create(dir.path())
            .await
            .expect("should create store");
        store
            .add_records(vec![
                test_record("about cats", "cats.txt", vec![1.0, 0.0, 0.0]),
                test_record("about dogs", "dogs.txt", vec![0.0, 1.0, 0.0]),
            ])
            .await
            .expect("should store records");
    }

    let store = VectorStore::open(dir.path())
        .await
        .expect("should reopen store");

    assert_eq!(store.count().await.expect("should count"), 2);

    let results = store
        .search(&[0.9, 0.1, 0.0], 2)
        .await
        .expect("should search");
    assert_eq!(results[0].chunk.metadata.source, "cats.txt");
    assert_eq!(results[0].chunk.content, "about cats");
}

#[tokio::test]
async fn create_replaces_an_existing_table() {
    let dir = TempDir::new().expect("should create temp dir");

    {
        let mut store = VectorStore::create(dir.path())
            .await
            .expect("should create store");
        store
            .add_records(vec![test_record("old", "old.txt", vec![1.0, 0.0])])
            .await
            .expect("should store records");
    }

    let mut store = VectorStore::create(dir.path())
        .await
        .expect("should recreate store");
    assert_eq!(store.count().await.expect("should count"), 0);

    store
        .add_records(vec![test_record("new", "new.txt", vec![1.0, 0.0, 0.0])])
        .await
        .expect("should store records with a new width");
    assert_eq!(store.count().await.expect("should count"), 1);
}
