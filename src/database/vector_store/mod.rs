#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use tracing::{debug, info};

use super::EmbeddingRecord;
use crate::chunking::DocumentChunk;
use crate::loader::DocumentMetadata;
use crate::{AgentError, Result};

const TABLE_NAME: &str = "chunks";

/// Vector index backed by LanceDB. Stores `(vector, chunk, entry id)` rows
/// and supports nearest-neighbor search over them. Append-only.
pub struct VectorStore {
    connection: Connection,
    vector_dimension: Option<usize>,
}

/// One nearest-neighbor hit, closest first in the result sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub chunk: DocumentChunk,
    pub distance: f32,
}

impl VectorStore {
    /// Create a fresh store at `path`, replacing any existing table. The
    /// table itself is created on the first insert, once the vector width
    /// is known.
    #[inline]
    pub async fn create(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let connection = connect(path).await?;

        let store = Self {
            connection,
            vector_dimension: None,
        };
        store.drop_table_if_exists().await?;

        debug!("Created vector store at {}", path.display());
        Ok(store)
    }

    /// Open an existing store. Fails with a not-found error when `path` or
    /// the index table does not exist.
    #[inline]
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AgentError::NotFound(format!(
                "Vector store not found at {}",
                path.display()
            )));
        }

        let connection = connect(path).await?;

        let table_names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| AgentError::Database(format!("Failed to list tables: {}", e)))?;
        if !table_names.iter().any(|name| name == TABLE_NAME) {
            return Err(AgentError::NotFound(format!(
                "No vector index data at {}",
                path.display()
            )));
        }

        let mut store = Self {
            connection,
            vector_dimension: None,
        };
        let dimension = store.detect_vector_dimension().await?;
        store.vector_dimension = Some(dimension);

        info!(
            "Opened vector store at {} ({} dimensions)",
            path.display(),
            dimension
        );
        Ok(store)
    }

    /// Append entries to the index. The first batch fixes the vector width;
    /// later batches must match it.
    #[inline]
    pub async fn add_records(&mut self, records: Vec<EmbeddingRecord>) -> Result<()> {
        let Some(first) = records.first() else {
            debug!("No records to store");
            return Ok(());
        };

        let dimension = first.vector.len();
        match self.vector_dimension {
            None => {
                self.connection
                    .create_empty_table(TABLE_NAME, schema(dimension))
                    .execute()
                    .await
                    .map_err(|e| AgentError::Database(format!("Failed to create table: {}", e)))?;
                self.vector_dimension = Some(dimension);
            }
            Some(existing) if existing != dimension => {
                return Err(AgentError::Database(format!(
                    "Embedding width mismatch: index has {} dimensions, batch has {}",
                    existing, dimension
                )));
            }
            Some(_) => {}
        }

        let batch = to_record_batch(&records, dimension)?;
        let batch_schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), batch_schema);

        let table = self.open_table().await?;
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| AgentError::Database(format!("Failed to insert entries: {}", e)))?;

        debug!("Stored {} entries", records.len());
        Ok(())
    }

    /// Nearest-neighbor search by vector distance, closest first.
    #[inline]
    pub async fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        if self.vector_dimension.is_none() {
            return Ok(Vec::new());
        }

        let table = self.open_table().await?;
        let stream = table
            .vector_search(query_vector)
            .map_err(|e| AgentError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(limit)
            .execute()
            .await
            .map_err(|e| AgentError::Database(format!("Failed to execute search: {}", e)))?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .map_err(|e| AgentError::Database(format!("Failed to read result stream: {}", e)))?;

        let mut results = Vec::new();
        for batch in &batches {
            results.extend(parse_search_batch(batch)?);
        }

        debug!("Search returned {} results", results.len());
        Ok(results)
    }

    /// Total number of entries in the index.
    #[inline]
    pub async fn count(&self) -> Result<u64> {
        if self.vector_dimension.is_none() {
            return Ok(0);
        }

        let table = self.open_table().await?;
        let count = table
            .count_rows(None)
            .await
            .map_err(|e| AgentError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    async fn open_table(&self) -> Result<lancedb::Table> {
        self.connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| AgentError::Database(format!("Failed to open table: {}", e)))
    }

    async fn detect_vector_dimension(&self) -> Result<usize> {
        let table = self.open_table().await?;
        let table_schema = table
            .schema()
            .await
            .map_err(|e| AgentError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in table_schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(AgentError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    async fn drop_table_if_exists(&self) -> Result<()> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| AgentError::Database(format!("Failed to list tables: {}", e)))?;

        if table_names.iter().any(|name| name == TABLE_NAME) {
            debug!("Dropping existing index table");
            self.connection
                .drop_table(TABLE_NAME)
                .await
                .map_err(|e| AgentError::Database(format!("Failed to drop table: {}", e)))?;
        }

        Ok(())
    }
}

async fn connect(path: &Path) -> Result<Connection> {
    // Relative index directories are legal in the config; LanceDB wants an
    // absolute file URI.
    let absolute = path.canonicalize()?;
    let uri = format!("file://{}", absolute.display());

    lancedb::connect(&uri)
        .execute()
        .await
        .map_err(|e| AgentError::Database(format!("Failed to connect to LanceDB: {}", e)))
}

fn schema(vector_dimension: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                vector_dimension as i32,
            ),
            false,
        ),
        Field::new("content", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("file_path", DataType::Utf8, false),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

fn to_record_batch(records: &[EmbeddingRecord], vector_dimension: usize) -> Result<RecordBatch> {
    let len = records.len();

    let mut ids = Vec::with_capacity(len);
    let mut contents = Vec::with_capacity(len);
    let mut sources = Vec::with_capacity(len);
    let mut file_paths = Vec::with_capacity(len);
    let mut chunk_indices = Vec::with_capacity(len);
    let mut created_ats = Vec::with_capacity(len);
    let mut flat_values = Vec::with_capacity(len * vector_dimension);

    for record in records {
        if record.vector.len() != vector_dimension {
            return Err(AgentError::Database(format!(
                "Embedding width mismatch within batch: expected {}, got {}",
                vector_dimension,
                record.vector.len()
            )));
        }

        ids.push(record.id.as_str());
        contents.push(record.chunk.content.as_str());
        sources.push(record.chunk.metadata.source.as_str());
        file_paths.push(record.chunk.metadata.file_path.display().to_string());
        chunk_indices.push(record.chunk.chunk_index as u32);
        created_ats.push(record.created_at.as_str());
        flat_values.extend_from_slice(&record.vector);
    }

    let values_array = Float32Array::from(flat_values);
    let item_field = Arc::new(Field::new("item", DataType::Float32, false));
    let vector_array = FixedSizeListArray::try_new(
        item_field,
        vector_dimension as i32,
        Arc::new(values_array),
        None,
    )
    .map_err(|e| AgentError::Database(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(contents)),
        Arc::new(StringArray::from(sources)),
        Arc::new(StringArray::from(file_paths)),
        Arc::new(UInt32Array::from(chunk_indices)),
        Arc::new(StringArray::from(created_ats)),
    ];

    RecordBatch::try_new(schema(vector_dimension), arrays)
        .map_err(|e| AgentError::Database(format!("Failed to create record batch: {}", e)))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
    let contents = string_column(batch, "content")?;
    let sources = string_column(batch, "source")?;
    let file_paths = string_column(batch, "file_path")?;

    let chunk_indices = batch
        .column_by_name("chunk_index")
        .and_then(|col| col.as_any().downcast_ref::<UInt32Array>())
        .ok_or_else(|| AgentError::Database("Missing or invalid chunk_index column".to_string()))?;

    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let mut results = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let chunk = DocumentChunk {
            content: contents.value(row).to_string(),
            metadata: DocumentMetadata {
                source: sources.value(row).to_string(),
                file_path: PathBuf::from(file_paths.value(row)),
            },
            chunk_index: chunk_indices.value(row) as usize,
        };

        let distance = distances.map_or(0.0, |array| {
            if array.is_null(row) { 0.0 } else { array.value(row) }
        });

        results.push(SearchResult { chunk, distance });
    }

    Ok(results)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| AgentError::Database(format!("Missing or invalid {} column", name)))
}
