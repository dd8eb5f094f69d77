//! `SQLite` storage with `sqlite-vec` for vector search.
//!
//! This module provides persistent storage for document chunks and their
//! embeddings, plus the connection wrapper and schema migrations shared by
//! the index backend.

mod connection;
mod documents;
mod schema;
mod vector;

pub use connection::Database;
pub use documents::{
    clear_documents_by_prefix, count_documents_by_prefix, delete_documents_by_file,
    get_document_by_rowid, get_documents_by_file, rowid_for_document, rowids_for_document,
    upsert_document,
};
pub use schema::{migrate, verify_schema, SCHEMA_VERSION};
pub use vector::{
    create_vec_table, delete_vector, init_sqlite_vec, insert_vector, load_extension,
    search_similar, DOCUMENT_VEC_TABLE,
};

/// Initialize storage with migrations and the vector table.
///
/// # Errors
///
/// Returns an error if database initialization fails.
pub fn init_storage(db: &Database, embedding_dim: usize) -> crate::Result<()> {
    db.with_conn(|conn| {
        // sqlite-vec is optional at init; search degrades loudly if absent
        if let Err(e) = load_extension(conn) {
            tracing::warn!("sqlite-vec extension not available: {e}");
        } else {
            create_vec_table(conn, DOCUMENT_VEC_TABLE, embedding_dim)?;
        }

        migrate(conn)?;
        verify_schema(conn)?;

        tracing::info!("Storage initialized, schema version {SCHEMA_VERSION}");
        Ok(())
    })
}
