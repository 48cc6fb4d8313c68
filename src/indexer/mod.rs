
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::chunking::{DocumentChunk, TextSplitter};
use crate::config::Config;
use crate::database::{EmbeddingRecord, FileMetadata, FileMetadataTable, VectorStore};
use crate::embeddings::EmbeddingProvider;
use crate::loader::{self, Document, DocumentMetadata};
use crate::{AgentError, Result};

/// Subdirectory of the index directory holding the LanceDB data.
const VECTORS_DIR_NAME: &str = "vectors";

/// Content and source recorded on the placeholder entry inserted when a
/// store is created from zero chunks. The underlying index needs at least
/// one row to fix its schema; search filters the placeholder back out.
const PLACEHOLDER_TEXT: &str = "empty";

/// Owns the end-to-end lifecycle of turning directories of files into a
/// queryable, persistent vector index, and answers per-file metadata
/// lookups. One instance per process; callers serialize writes.
pub struct FileIndexer {
    embedder: Arc<dyn EmbeddingProvider>,
    splitter: TextSplitter,
    store: Option<VectorStore>,
    file_metadata: FileMetadataTable,
    index_dir: PathBuf,
}

impl FileIndexer {
    #[inline]
    pub fn new(config: &Config, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let splitter = TextSplitter::new(&config.chunking)?;

        Ok(Self {
            embedder,
            splitter,
            store: None,
            file_metadata: FileMetadataTable::new(),
            index_dir: config.paths.index_dir.clone(),
        })
    }

    /// Load every regular file in `directory` (non-recursive), dispatching
    /// to a format-specific loader by extension. A file that fails to load
    /// is logged and skipped; the rest of the directory still loads. A
    /// missing directory yields an empty result with a warning.
    ///
    /// Records a metadata entry for every successfully loaded file,
    /// overwriting any prior entry with the same filename.
    #[inline]
    pub fn load_documents(&mut self, directory: &Path) -> Result<Vec<Document>> {
        if !directory.exists() {
            warn!("Directory {} does not exist", directory.display());
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(directory)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| !path.is_dir())
            .collect();
        paths.sort();

        let mut documents = Vec::new();
        for path in paths {
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());

            match loader::load_file(&path) {
                Ok(document) => {
                    let size = fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
                    self.file_metadata.insert(
                        filename,
                        FileMetadata {
                            file_path: path.clone(),
                            file_type: extension_with_dot(&path),
                            size,
                        },
                    );
                    documents.push(document);
                }
                Err(e) => {
                    warn!("Error loading file {}: {}", filename, e);
                }
            }
        }

        info!(
            "Loaded {} documents from {}",
            documents.len(),
            directory.display()
        );
        Ok(documents)
    }

    /// Split documents into chunks with the configured size and overlap.
    #[inline]
    pub fn process_documents(&self, documents: &[Document]) -> Vec<DocumentChunk> {
        self.splitter.split_documents(documents)
    }

    /// Build a fresh index from the given chunks, computing embeddings via
    /// the embedding provider. Zero chunks still produce a valid index
    /// containing only the placeholder entry.
    #[inline]
    pub async fn create_vector_store(&mut self, chunks: Vec<DocumentChunk>) -> Result<()> {
        let chunks = if chunks.is_empty() {
            warn!("No chunks provided to create vector store, inserting placeholder entry");
            vec![placeholder_chunk()]
        } else {
            chunks
        };

        let records = self.embed_chunks(&chunks)?;

        let mut store = VectorStore::create(&self.vectors_dir()).await?;
        store.add_records(records).await?;
        self.store = Some(store);

        info!("Created vector store with {} chunks", chunks.len());
        Ok(())
    }

    /// Persist the file metadata sidecar next to the vector data. The
    /// LanceDB data is written as entries are inserted; this completes the
    /// persisted unit. No-op when no index exists yet.
    #[inline]
    pub fn save(&self) -> Result<()> {
        if self.store.is_none() {
            debug!("No vector store to save");
            return Ok(());
        }

        fs::create_dir_all(&self.index_dir)?;
        self.file_metadata.save(&self.index_dir)?;

        debug!("Saved index to {}", self.index_dir.display());
        Ok(())
    }

    /// Restore the index and the file metadata table persisted under
    /// `path`. Fails with a not-found error when either part is missing,
    /// without mutating any indexer state.
    #[inline]
    pub async fn load(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(AgentError::NotFound(format!(
                "Vector store not found at {}",
                path.display()
            )));
        }

        let store = VectorStore::open(&path.join(VECTORS_DIR_NAME)).await?;
        let file_metadata = FileMetadataTable::load(path)?;

        self.store = Some(store);
        self.file_metadata = file_metadata;
        self.index_dir = path.to_path_buf();

        info!("Loaded vector store from {}", path.display());
        Ok(())
    }

    /// Append chunks to the existing index, or create one if none exists
    /// yet. Always followed by a save.
    #[inline]
    pub async fn add_documents(&mut self, chunks: Vec<DocumentChunk>) -> Result<()> {
        match self.store.as_mut() {
            Some(store) => {
                let records = embed_chunks_with(self.embedder.as_ref(), &chunks)?;
                store.add_records(records).await?;
                debug!("Appended {} chunks to the index", chunks.len());
            }
            None => {
                self.create_vector_store(chunks).await?;
            }
        }

        self.save()
    }

    /// Embed `query` and return the `k` nearest chunks, closest first.
    /// Fails when no index has been created or loaded.
    #[inline]
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<DocumentChunk>> {
        let Some(store) = self.store.as_ref() else {
            return Err(AgentError::NotInitialized(
                "create or load a vector store before searching".to_string(),
            ));
        };

        let query_vector = self.embedder.embed(query)?;

        // Fetch one extra row so the placeholder entry never displaces a
        // real result.
        let results = store.search(&query_vector, k + 1).await?;

        let chunks: Vec<DocumentChunk> = results
            .into_iter()
            .filter(|result| !is_placeholder(&result.chunk))
            .take(k)
            .map(|result| result.chunk)
            .collect();

        debug!("Search for '{}' returned {} chunks", query, chunks.len());
        Ok(chunks)
    }

    /// Pure metadata lookup; `None` for unknown filenames.
    #[inline]
    pub fn get_file_metadata(&self, filename: &str) -> Option<&FileMetadata> {
        self.file_metadata.get(filename)
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.store.is_some()
    }

    /// Number of entries in the index, placeholder included.
    #[inline]
    pub async fn entry_count(&self) -> Result<u64> {
        match self.store.as_ref() {
            Some(store) => store.count().await,
            None => Ok(0),
        }
    }

    fn vectors_dir(&self) -> PathBuf {
        self.index_dir.join(VECTORS_DIR_NAME)
    }

    fn embed_chunks(&self, chunks: &[DocumentChunk]) -> Result<Vec<EmbeddingRecord>> {
        let bar = if console::user_attended_stderr() {
            ProgressBar::new_spinner().with_style(
                ProgressStyle::with_template("{spinner} {msg}")
                    .expect("style template is valid"),
            )
        } else {
            ProgressBar::hidden()
        };
        bar.set_message(format!("Embedding {} chunks", chunks.len()));

        let records = embed_chunks_with(self.embedder.as_ref(), chunks);
        bar.finish_and_clear();
        records
    }
}

fn embed_chunks_with(
    embedder: &dyn EmbeddingProvider,
    chunks: &[DocumentChunk],
) -> Result<Vec<EmbeddingRecord>> {
    let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
    let vectors = embedder.embed_batch(&texts)?;

    Ok(vectors
        .into_iter()
        .zip(chunks.iter().cloned())
        .map(|(vector, chunk)| EmbeddingRecord::new(vector, chunk))
        .collect())
}

fn placeholder_chunk() -> DocumentChunk {
    DocumentChunk {
        content: PLACEHOLDER_TEXT.to_string(),
        metadata: DocumentMetadata {
            source: PLACEHOLDER_TEXT.to_string(),
            file_path: PathBuf::from(PLACEHOLDER_TEXT),
        },
        chunk_index: 0,
    }
}

fn is_placeholder(chunk: &DocumentChunk) -> bool {
    chunk.content == PLACEHOLDER_TEXT && chunk.metadata.source == PLACEHOLDER_TEXT
}

fn extension_with_dot(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default()
}
