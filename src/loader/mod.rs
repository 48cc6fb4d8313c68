
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::debug;

use crate::Result;

/// Provenance carried by every document and every chunk derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// Filename of the source file
    pub source: String,
    /// Full path the file was loaded from
    pub file_path: PathBuf,
}

/// Raw text extracted from one source file. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// File format dispatch, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Pdf,
    Text,
    /// Anything else gets a best-effort text extraction that may fail per
    /// file without affecting the rest of a directory load.
    Generic,
}

impl FileFormat {
    #[inline]
    pub fn from_path(path: &Path) -> Self {
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            return Self::Generic;
        };

        if extension.eq_ignore_ascii_case("pdf") {
            Self::Pdf
        } else if ["txt", "md", "markdown", "csv", "log"]
            .iter()
            .any(|known| extension.eq_ignore_ascii_case(known))
        {
            Self::Text
        } else {
            Self::Generic
        }
    }
}

/// Load a single file into a document, dispatching on its extension.
#[inline]
pub fn load_file(path: &Path) -> Result<Document> {
    let format = FileFormat::from_path(path);
    debug!("Loading {} as {:?}", path.display(), format);

    let content = match format {
        FileFormat::Pdf => read_pdf(path)?,
        FileFormat::Text => read_text(path)?,
        FileFormat::Generic => read_generic(path)?,
    };

    let source = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(Document {
        content,
        metadata: DocumentMetadata {
            source,
            file_path: path.to_path_buf(),
        },
    })
}

fn read_text(path: &Path) -> Result<String> {
    Ok(fs::read_to_string(path)
        .with_context(|| format!("Failed to read text file {}", path.display()))?)
}

fn read_pdf(path: &Path) -> Result<String> {
    let text = pdf_extract::extract_text(path)
        .map_err(|e| anyhow!("Failed to extract text from PDF {}: {}", path.display(), e))?;
    Ok(text)
}

/// Best-effort extraction for unknown formats: accept anything that looks
/// like text after lossy UTF-8 conversion, reject clearly binary content.
fn read_generic(path: &Path) -> Result<String> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read file {}", path.display()))?;

    if looks_binary(&bytes) {
        return Err(anyhow!(
            "File {} does not contain extractable text",
            path.display()
        )
        .into());
    }

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn looks_binary(bytes: &[u8]) -> bool {
    if bytes.contains(&0) {
        return true;
    }

    let control_bytes = bytes
        .iter()
        .filter(|byte| byte.is_ascii_control() && !matches!(byte, b'\n' | b'\r' | b'\t'))
        .count();

    // More than 10% control characters is not text
    control_bytes * 10 > bytes.len()
}
