// Storage module
// LanceDB holds the vector index; a JSON sidecar holds the per-file metadata

pub mod metadata;
pub mod vector_store;

pub use metadata::{FileMetadata, FileMetadataTable};
pub use vector_store::{SearchResult, VectorStore};

use chrono::Utc;
use uuid::Uuid;

use crate::chunking::DocumentChunk;

/// One entry in the vector index: an embedding plus the chunk it represents.
/// Entries are append-only and never individually deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    /// Unique identifier for this entry
    pub id: String,
    /// The embedding vector for the chunk content
    pub vector: Vec<f32>,
    /// The chunk this embedding represents
    pub chunk: DocumentChunk,
    /// Timestamp when this entry was created
    pub created_at: String,
}

impl EmbeddingRecord {
    #[inline]
    pub fn new(vector: Vec<f32>, chunk: DocumentChunk) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            vector,
            chunk,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}
