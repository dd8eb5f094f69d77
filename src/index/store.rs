//! Vector store: the production `IndexBackend`.
//!
//! Joins the embedding service and `SQLite` storage: chunks are embedded on
//! upsert, stored with their vectors, and searched by embedding the query.

use super::{DocumentChunk, IndexBackend, SearchHit};
use crate::embeddings::EmbeddingService;
use crate::storage::{
    self, clear_documents_by_prefix, count_documents_by_prefix, delete_documents_by_file,
    get_document_by_rowid, search_similar, upsert_document, Database, DOCUMENT_VEC_TABLE,
};
use crate::Result;

/// `SQLite` + sqlite-vec backed index.
///
/// Clone is cheap - both members are handle types.
#[derive(Clone)]
pub struct VectorStore {
    db: Database,
    embeddings: EmbeddingService,
}

impl VectorStore {
    /// Create a new vector store. Call [`VectorStore::init`] before use.
    #[must_use]
    pub fn new(db: Database, embeddings: EmbeddingService) -> Self {
        Self { db, embeddings }
    }

    /// Initialize storage (migrations, vector table) and the embedding
    /// service. An embedding init failure is fatal for the service; the
    /// caller must not retry.
    ///
    /// # Errors
    ///
    /// Returns an error if storage or embedding initialization fails.
    pub async fn init(&self) -> Result<()> {
        storage::init_storage(&self.db, self.embeddings.dimension())?;
        self.embeddings.init().await?;
        Ok(())
    }

    /// Access the underlying database handle.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("db", &self.db)
            .field("embeddings", &self.embeddings)
            .finish()
    }
}

#[async_trait::async_trait]
impl IndexBackend for VectorStore {
    async fn upsert(&self, chunk: DocumentChunk) -> Result<()> {
        let embedding = self.embeddings.embed_one(chunk.text.clone()).await?;

        self.db.with_transaction(|conn| {
            upsert_document(conn, &chunk, Some(&embedding))?;
            Ok(())
        })?;

        tracing::trace!(document_id = %chunk.document_id, "Upserted chunk");
        Ok(())
    }

    async fn remove_by_file(&self, file_path: &str) -> Result<u64> {
        self.db
            .with_transaction(|conn| delete_documents_by_file(conn, file_path))
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        if query.is_empty() {
            tracing::warn!("Empty search query, returning no results");
            return Ok(Vec::new());
        }

        let query_embedding = self.embeddings.embed_one(query).await?;

        let hits = self.db.with_conn(|conn| {
            let matches = search_similar(conn, DOCUMENT_VEC_TABLE, &query_embedding, top_k)?;

            let mut hits = Vec::with_capacity(matches.len());
            for (rowid, distance) in matches {
                // A vector row can outlive its document row if a vector
                // delete was skipped; such matches are dropped
                let Ok(doc) = get_document_by_rowid(conn, rowid) else {
                    tracing::warn!(rowid, "Vector match without document row");
                    continue;
                };
                let score = (1.0 - (distance / 2.0)).clamp(0.0, 1.0);
                hits.push(SearchHit {
                    document_id: doc.document_id,
                    file_path: doc.file_path,
                    content_hash: doc.content_hash,
                    modified_at: doc.modified_at,
                    chunk_index: doc.chunk_index,
                    total_chunks: doc.total_chunks,
                    text: doc.text,
                    metadata: doc.metadata,
                    score,
                });
            }
            Ok(hits)
        })?;

        tracing::debug!(count = hits.len(), top_k, "Search completed");
        Ok(hits)
    }

    async fn count_by_prefix(&self, prefix: &str) -> Result<i64> {
        self.db
            .with_conn(|conn| count_documents_by_prefix(conn, prefix))
    }

    async fn clear_by_prefix(&self, prefix: &str) -> Result<u64> {
        self.db
            .with_transaction(|conn| clear_documents_by_prefix(conn, prefix))
    }
}
