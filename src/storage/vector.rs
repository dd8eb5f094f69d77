//! Vector search support using the sqlite-vec extension.
//!
//! Provides helpers for creating and querying vec0 virtual tables
//! for similarity search over document embeddings.

use rusqlite::Connection;
use sqlite_vec::sqlite3_vec_init;
use std::sync::Once;

use crate::error::BackendError;
use crate::Result;

/// Vector table name for document chunk embeddings.
pub const DOCUMENT_VEC_TABLE: &str = "document_embeddings";

// Static guard to ensure sqlite-vec is initialized exactly once
static INIT: Once = Once::new();

/// Initialize sqlite-vec extension globally.
///
/// This must be called before any database connections are created.
/// Uses `sqlite3_auto_extension` to register the extension globally
/// so it's automatically available in all new connections.
#[allow(unsafe_code)]
pub fn init_sqlite_vec() {
    INIT.call_once(|| {
        // SAFETY: `sqlite3_vec_init` is a valid extension initializer from
        // sqlite-vec, and the Once guard prevents double registration. This
        // follows the loading pattern documented at
        // https://alexgarcia.xyz/sqlite-vec/rust.html
        #[allow(clippy::missing_transmute_annotations)]
        unsafe {
            rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
                sqlite3_vec_init as *const (),
            )));
        }
        tracing::info!("sqlite-vec extension registered via sqlite3_auto_extension");
    });
}

/// Verify the sqlite-vec extension is available on a connection.
///
/// The actual registration happens in `init_sqlite_vec()` which must be
/// called before any database connections are opened.
///
/// # Errors
///
/// Returns an error if the extension cannot be verified.
pub fn load_extension(conn: &Connection) -> Result<()> {
    match conn.execute_batch("SELECT vec_version();") {
        Ok(()) => {
            tracing::debug!("sqlite-vec extension verified");
            Ok(())
        }
        Err(e) => {
            let err_msg = format!(
                "sqlite-vec extension not available; vector search cannot work. \
                 Make sure init_sqlite_vec() was called before database init. Error: {e}"
            );
            tracing::error!("{err_msg}");
            Err(BackendError::Vector(err_msg).into())
        }
    }
}

/// Create a vec0 virtual table for vector similarity search.
///
/// # Errors
///
/// Returns an error if the table cannot be created.
pub fn create_vec_table(conn: &Connection, table_name: &str, dimension: usize) -> Result<()> {
    let sql = format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS {table_name} USING vec0(
            id INTEGER PRIMARY KEY,
            embedding FLOAT[{dimension}]
        )"
    );

    conn.execute(&sql, [])
        .map_err(|e| BackendError::Vector(format!("failed to create vec table: {e}")))?;

    tracing::debug!(table = table_name, dim = dimension, "Created vec0 table");
    Ok(())
}

/// Insert a vector into a vec0 table.
///
/// # Errors
///
/// Returns an error if the insertion fails.
pub fn insert_vector(
    conn: &Connection,
    table_name: &str,
    id: i64,
    embedding: &[f32],
) -> Result<()> {
    let blob = vector_to_blob(embedding);

    let sql = format!("INSERT INTO {table_name} (id, embedding) VALUES (?, ?)");
    conn.execute(&sql, rusqlite::params![id, blob])
        .map_err(|e| BackendError::Vector(format!("failed to insert vector: {e}")))?;

    Ok(())
}

/// Search for similar vectors.
///
/// Returns (id, distance) pairs sorted by distance ascending (most similar
/// first).
///
/// # Errors
///
/// Returns an error if the search fails.
pub fn search_similar(
    conn: &Connection,
    table_name: &str,
    query_embedding: &[f32],
    limit: usize,
) -> Result<Vec<(i64, f32)>> {
    let blob = vector_to_blob(query_embedding);

    let sql = format!(
        "SELECT id, distance
         FROM {table_name}
         WHERE embedding MATCH ?
         ORDER BY distance
         LIMIT ?"
    );

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| BackendError::Vector(format!("failed to prepare search: {e}")))?;

    let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
    let results = stmt
        .query_map(rusqlite::params![blob, limit_i64], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, f32>(1)?))
        })
        .map_err(|e| BackendError::Vector(format!("failed to execute search: {e}")))?;

    let mut matches = Vec::new();
    for result in results {
        let (id, distance) =
            result.map_err(|e| BackendError::Vector(format!("failed to read result: {e}")))?;
        matches.push((id, distance));
    }

    Ok(matches)
}

/// Delete a vector from a vec0 table.
///
/// # Errors
///
/// Returns an error if the deletion fails.
pub fn delete_vector(conn: &Connection, table_name: &str, id: i64) -> Result<()> {
    let sql = format!("DELETE FROM {table_name} WHERE id = ?");
    conn.execute(&sql, rusqlite::params![id])
        .map_err(|e| BackendError::Vector(format!("failed to delete vector: {e}")))?;
    Ok(())
}

/// Convert a vector to a blob for storage.
fn vector_to_blob(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}
