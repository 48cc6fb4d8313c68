
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AgentError, Result};

/// Name of the sidecar file persisted next to the vector data.
pub const SIDECAR_FILE_NAME: &str = "file_metadata.json";

/// Metadata recorded for each successfully loaded source file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileMetadata {
    /// Full path the file was loaded from
    pub file_path: PathBuf,
    /// File extension including the leading dot, empty when there is none
    pub file_type: String,
    /// File size in bytes at load time
    pub size: u64,
}

/// Mapping from source filename to its metadata. On duplicate filenames the
/// last load wins. Persisted as a JSON sidecar so lookups survive restarts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileMetadataTable {
    entries: BTreeMap<String, FileMetadata>,
}

impl FileMetadataTable {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn insert(&mut self, filename: String, metadata: FileMetadata) {
        self.entries.insert(filename, metadata);
    }

    /// Pure lookup; `None` for unknown filenames.
    #[inline]
    pub fn get(&self, filename: &str) -> Option<&FileMetadata> {
        self.entries.get(filename)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the sidecar file under `dir`.
    #[inline]
    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join(SIDECAR_FILE_NAME);
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| AgentError::Database(format!("Failed to serialize metadata: {}", e)))?;

        fs::write(&path, content)?;
        debug!("Saved {} metadata entries to {}", self.len(), path.display());
        Ok(())
    }

    /// Read the sidecar file from `dir`; fails with a not-found error when
    /// the sidecar is missing.
    #[inline]
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(SIDECAR_FILE_NAME);
        if !path.exists() {
            return Err(AgentError::NotFound(format!(
                "File metadata sidecar not found at {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(&path)?;
        let table: Self = serde_json::from_str(&content)
            .map_err(|e| AgentError::Database(format!("Failed to parse metadata sidecar: {}", e)))?;

        debug!(
            "Loaded {} metadata entries from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }
}
