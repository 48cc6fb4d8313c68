
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::config::ConfigError;
use crate::loader::{Document, DocumentMetadata};

/// Separators tried in order when splitting text, largest first. Text that
/// still exceeds the chunk size after the last separator is split at
/// character boundaries.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Configuration for document chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Number of characters of context shared between adjacent chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// A bounded slice of a document's text, carrying the source document's
/// provenance. This is the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    /// The chunk text
    pub content: String,
    /// Provenance inherited from the source document, unmodified
    pub metadata: DocumentMetadata,
    /// The index of this chunk within its source document
    pub chunk_index: usize,
}

/// Splits documents into overlapping chunks using a recursive separator
/// strategy: paragraph breaks first, then line breaks, then spaces, then
/// raw character boundaries as a last resort.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    /// Create a splitter from the chunking configuration.
    ///
    /// Fails when `chunk_size` is zero or `chunk_overlap` is not strictly
    /// smaller than `chunk_size`.
    #[inline]
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(config.chunk_size).into());
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(
                ConfigError::OverlapTooLarge(config.chunk_size, config.chunk_overlap).into(),
            );
        }

        Ok(Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        })
    }

    /// Split each document into chunks, preserving its metadata on every
    /// chunk. Chunk indices restart at zero for each document.
    #[inline]
    pub fn split_documents(&self, documents: &[Document]) -> Vec<DocumentChunk> {
        let mut chunks = Vec::new();

        for document in documents {
            let pieces = self.split_text(&document.content);
            debug!(
                "Split document '{}' into {} chunks",
                document.metadata.source,
                pieces.len()
            );

            chunks.extend(pieces.into_iter().enumerate().map(|(chunk_index, content)| {
                DocumentChunk {
                    content,
                    metadata: document.metadata.clone(),
                    chunk_index,
                }
            }));
        }

        chunks
    }

    /// Split raw text into chunks of at most `chunk_size` characters.
    ///
    /// Separators are retained at the end of the piece they terminate, so
    /// concatenating the chunks (minus the overlap each chunk repeats from
    /// its predecessor) reconstructs the input exactly.
    #[inline]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        if char_len(text) <= self.chunk_size {
            return vec![text.to_string()];
        }

        let fragments = self.fragment(text, &SEPARATORS);
        self.merge_fragments(fragments)
    }

    /// Break text into fragments no larger than `chunk_size`, recursing to
    /// the next smaller separator for any piece that is still too big.
    fn fragment(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let Some((separator, rest)) = separators.split_first() else {
            return hard_split(text, self.chunk_size);
        };

        let mut fragments = Vec::new();
        for piece in text.split_inclusive(separator) {
            if char_len(piece) <= self.chunk_size {
                fragments.push(piece.to_string());
            } else {
                fragments.extend(self.fragment(piece, rest));
            }
        }
        fragments
    }

    /// Merge fragments into chunks using a sliding window: when the window
    /// overflows, emit it as a chunk and retain a tail of whole fragments
    /// totalling at most `chunk_overlap` characters as shared context.
    fn merge_fragments(&self, fragments: Vec<String>) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(String, usize)> = VecDeque::new();
        let mut window_len = 0usize;

        for fragment in fragments {
            let len = char_len(&fragment);

            if window_len + len > self.chunk_size && !window.is_empty() {
                chunks.push(concat_window(&window));

                while window_len > self.chunk_overlap
                    || (window_len + len > self.chunk_size && window_len > 0)
                {
                    let Some((_, dropped)) = window.pop_front() else {
                        break;
                    };
                    window_len -= dropped;
                }
            }

            window_len += len;
            window.push_back((fragment, len));
        }

        if !window.is_empty() {
            chunks.push(concat_window(&window));
        }

        chunks
    }
}

fn concat_window(window: &VecDeque<(String, usize)>) -> String {
    window.iter().map(|(fragment, _)| fragment.as_str()).collect()
}

/// Split text into pieces of exactly `limit` characters (the final piece may
/// be shorter), respecting UTF-8 character boundaries.
fn hard_split(text: &str, limit: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;

    for ch in text.chars() {
        if count == limit {
            pieces.push(std::mem::take(&mut current));
            count = 0;
        }
        current.push(ch);
        count += 1;
    }

    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
