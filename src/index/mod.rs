//! Index backend contract and data model.
//!
//! The coordinator talks to the vector index exclusively through the
//! [`IndexBackend`] trait: embed-and-persist a chunk, remove a file's
//! chunks, search, and prefix-scoped count/clear. The production
//! implementation is [`VectorStore`]; tests substitute their own.

mod store;

use serde::{Deserialize, Serialize};

use crate::Result;

pub use store::VectorStore;

/// Metadata attached to every stored chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// The original path of the indexed file.
    pub original_path: String,
}

/// A single text window of a file, the unit stored and searched.
///
/// Chunks are immutable once written: a file update is realized as
/// remove-all-chunks-for-path followed by insert-all-new-chunks, because the
/// total chunk count may change between versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Stable identifier: `<file_path>::<chunk_index>`.
    pub document_id: String,

    /// Path to the original file.
    pub file_path: String,

    /// Content hash of the whole file this chunk came from.
    pub content_hash: String,

    /// Last-modified timestamp of the file, unix seconds.
    pub modified_at: f64,

    /// Index of this chunk within the file (0-based).
    pub chunk_index: u32,

    /// Total number of chunks for the file.
    pub total_chunks: u32,

    /// The text content of this chunk.
    pub text: String,

    /// Metadata carrying the original file path.
    pub metadata: ChunkMetadata,

    /// Embedding vector; populated by the backend, never serialized out.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl DocumentChunk {
    /// Derive the stable chunk identifier for a file path and chunk index.
    #[must_use]
    pub fn derive_id(file_path: &str, chunk_index: u32) -> String {
        format!("{file_path}::{chunk_index}")
    }

    /// Create a new chunk for a file.
    #[must_use]
    pub fn new(
        file_path: impl Into<String>,
        content_hash: impl Into<String>,
        modified_at: f64,
        chunk_index: u32,
        total_chunks: u32,
        text: impl Into<String>,
    ) -> Self {
        let file_path = file_path.into();
        Self {
            document_id: Self::derive_id(&file_path, chunk_index),
            metadata: ChunkMetadata {
                original_path: file_path.clone(),
            },
            file_path,
            content_hash: content_hash.into(),
            modified_at,
            chunk_index,
            total_chunks,
            text: text.into(),
            embedding: None,
        }
    }
}

/// A search result; the embedding vector is never included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Stable chunk identifier.
    pub document_id: String,
    /// Path to the original file.
    pub file_path: String,
    /// Content hash of the file at indexing time.
    pub content_hash: String,
    /// Last-modified timestamp of the file, unix seconds.
    pub modified_at: f64,
    /// Index of this chunk within the file.
    pub chunk_index: u32,
    /// Total number of chunks for the file.
    pub total_chunks: u32,
    /// The matching chunk text.
    pub text: String,
    /// Metadata carrying the original file path.
    pub metadata: ChunkMetadata,
    /// Normalized similarity score (1.0 = perfect match).
    pub score: f32,
}

/// The vector index the coordinator writes to and searches.
///
/// All operations may fail (storage unavailable, embedding failure); callers
/// must not assume partial success.
#[async_trait::async_trait]
pub trait IndexBackend: Send + Sync {
    /// Embed a chunk's text and persist it. Idempotent per `document_id`:
    /// replaying the same chunk never duplicates rows.
    async fn upsert(&self, chunk: DocumentChunk) -> Result<()>;

    /// Delete every chunk whose `file_path` matches exactly. Succeeds as a
    /// no-op when no chunks exist for the path. Returns the number removed.
    async fn remove_by_file(&self, file_path: &str) -> Result<u64>;

    /// Search for chunks similar to the query text.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>>;

    /// Count chunks whose `file_path` starts with the given prefix.
    async fn count_by_prefix(&self, prefix: &str) -> Result<i64>;

    /// Delete chunks whose `file_path` starts with the given prefix.
    /// Returns the number removed.
    async fn clear_by_prefix(&self, prefix: &str) -> Result<u64>;
}
