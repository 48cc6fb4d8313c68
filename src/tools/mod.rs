
use std::sync::Arc;

use async_trait::async_trait;
use itertools::Itertools;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::indexer::FileIndexer;
use crate::llm::ToolSpec;

/// Number of chunks the search tool retrieves per query.
const SEARCH_RESULT_COUNT: usize = 3;

pub const DOCUMENT_SEARCH_TOOL_NAME: &str = "document_search";
pub const FILE_READER_TOOL_NAME: &str = "file_reader";

/// Fixed reply when a search matches nothing, so the agent loop can tell
/// "ran but found nothing" apart from "failed".
pub const NO_RESULTS_MESSAGE: &str = "No relevant documents found for the query.";

/// A capability callable by the agent loop.
///
/// Tools never raise to their caller: every internal failure is rendered
/// into the returned text, so a single tool malfunction degrades into a
/// visible-but-continuable answer.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON schema for the tool's arguments.
    fn parameters(&self) -> Value;

    async fn run(&self, input: &str) -> String;

    /// The function-calling definition handed to the model.
    #[inline]
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Searches the vector index for chunks relevant to a query.
pub struct DocumentSearchTool {
    indexer: Arc<RwLock<FileIndexer>>,
}

impl DocumentSearchTool {
    #[inline]
    pub fn new(indexer: Arc<RwLock<FileIndexer>>) -> Self {
        Self { indexer }
    }
}

#[async_trait]
impl Tool for DocumentSearchTool {
    #[inline]
    fn name(&self) -> &'static str {
        DOCUMENT_SEARCH_TOOL_NAME
    }

    #[inline]
    fn description(&self) -> &'static str {
        "Use this tool to search for relevant documents based on a query. \
         Input should be the search query."
    }

    #[inline]
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                }
            },
            "required": ["query"],
            "additionalProperties": false
        })
    }

    #[inline]
    async fn run(&self, input: &str) -> String {
        debug!("Searching documents for query: {}", input);

        let results = {
            let indexer = self.indexer.read().await;
            indexer.search(input, SEARCH_RESULT_COUNT).await
        };

        match results {
            Ok(results) if results.is_empty() => NO_RESULTS_MESSAGE.to_string(),
            Ok(results) => {
                let blocks = results
                    .iter()
                    .enumerate()
                    .map(|(rank, chunk)| {
                        format!(
                            "Document {} (Source: {}):\n{}",
                            rank + 1,
                            chunk.metadata.source,
                            chunk.content
                        )
                    })
                    .join("\n\n");

                format!("Found the following relevant documents:\n\n{}", blocks)
            }
            Err(e) => {
                error!("Document search failed: {}", e);
                format!("Error searching for documents: {}", e)
            }
        }
    }
}

/// Reads the full raw content of an indexed file by its logical filename.
///
/// Bypasses chunking entirely: the whole file is returned, even when it
/// exceeds what fits in a single model context.
pub struct FileReaderTool {
    indexer: Arc<RwLock<FileIndexer>>,
}

impl FileReaderTool {
    #[inline]
    pub fn new(indexer: Arc<RwLock<FileIndexer>>) -> Self {
        Self { indexer }
    }
}

#[async_trait]
impl Tool for FileReaderTool {
    #[inline]
    fn name(&self) -> &'static str {
        FILE_READER_TOOL_NAME
    }

    #[inline]
    fn description(&self) -> &'static str {
        "Use this tool to read the content of files from the file system. \
         Input should be the filename."
    }

    #[inline]
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filename": {
                    "type": "string",
                    "description": "Name of an indexed file"
                }
            },
            "required": ["filename"],
            "additionalProperties": false
        })
    }

    #[inline]
    async fn run(&self, input: &str) -> String {
        debug!("Reading file: {}", input);

        let metadata = {
            let indexer = self.indexer.read().await;
            indexer.get_file_metadata(input).cloned()
        };

        let Some(metadata) = metadata else {
            return format!("Error: File '{}' not found in the indexed files.", input);
        };

        match tokio::fs::read_to_string(&metadata.file_path).await {
            Ok(content) => content,
            Err(e) => format!("Error reading file '{}': {}", input, e),
        }
    }
}
