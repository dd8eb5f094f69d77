//! Document chunk storage operations.
//!
//! CRUD for stored chunks keyed by `document_id`, with exact-path and
//! path-prefix scoped deletes for file updates and forced re-indexes.

use rusqlite::{params, Connection};

use super::vector::{delete_vector, insert_vector, DOCUMENT_VEC_TABLE};
use crate::error::BackendError;
use crate::index::{ChunkMetadata, DocumentChunk};
use crate::Result;

/// Insert or replace a chunk. Returns the assigned rowid.
///
/// Any existing row (and its embedding) for the same `document_id` is
/// removed first, so replays never duplicate rows.
///
/// # Errors
///
/// Returns an error if the write fails.
pub fn upsert_document(
    conn: &Connection,
    chunk: &DocumentChunk,
    embedding: Option<&[f32]>,
) -> Result<i64> {
    if let Some(old_id) = rowid_for_document(conn, &chunk.document_id)? {
        let _ = delete_vector(conn, DOCUMENT_VEC_TABLE, old_id);
        conn.execute("DELETE FROM documents WHERE id = ?", [old_id])
            .map_err(|e| BackendError::Database(format!("failed to replace document: {e}")))?;
    }

    conn.execute(
        "INSERT INTO documents
            (document_id, file_path, content_hash, modified_at, chunk_index, total_chunks, text, original_path)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            chunk.document_id,
            chunk.file_path,
            chunk.content_hash,
            chunk.modified_at,
            chunk.chunk_index,
            chunk.total_chunks,
            chunk.text,
            chunk.metadata.original_path,
        ],
    )
    .map_err(|e| BackendError::Database(format!("failed to insert document: {e}")))?;

    let id = conn.last_insert_rowid();

    if let Some(embedding) = embedding {
        insert_vector(conn, DOCUMENT_VEC_TABLE, id, embedding)?;
    }

    tracing::trace!(id, document_id = %chunk.document_id, "Upserted document chunk");
    Ok(id)
}

/// Look up the rowid for a `document_id`, if the chunk exists.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn rowid_for_document(conn: &Connection, document_id: &str) -> Result<Option<i64>> {
    let result = conn.query_row(
        "SELECT id FROM documents WHERE document_id = ?",
        [document_id],
        |row| row.get(0),
    );

    match result {
        Ok(id) => Ok(Some(id)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(BackendError::Database(format!("failed to look up document: {e}")).into()),
    }
}

/// Collect the rowids for every chunk of a file.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn rowids_for_document(conn: &Connection, file_path: &str) -> Result<Vec<i64>> {
    let mut stmt = conn
        .prepare("SELECT id FROM documents WHERE file_path = ?")
        .map_err(|e| BackendError::Database(format!("failed to prepare query: {e}")))?;

    let rows = stmt
        .query_map([file_path], |row| row.get(0))
        .map_err(|e| BackendError::Database(format!("failed to query rowids: {e}")))?;

    Ok(rows.flatten().collect())
}

/// Delete all chunks for a file. Returns the number deleted; zero when the
/// file had no chunks.
///
/// # Errors
///
/// Returns an error if the deletion fails.
pub fn delete_documents_by_file(conn: &Connection, file_path: &str) -> Result<u64> {
    let ids = rowids_for_document(conn, file_path)?;

    for id in &ids {
        let _ = delete_vector(conn, DOCUMENT_VEC_TABLE, *id);
    }

    let count = conn
        .execute("DELETE FROM documents WHERE file_path = ?", [file_path])
        .map_err(|e| BackendError::Database(format!("failed to delete documents: {e}")))?;

    if count > 0 {
        tracing::debug!(path = file_path, count, "Deleted document chunks for file");
    }
    Ok(count as u64)
}

/// Count chunks whose `file_path` starts with a prefix.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count_documents_by_prefix(conn: &Connection, prefix: &str) -> Result<i64> {
    let pattern = format!("{}%", escape_like(prefix));
    conn.query_row(
        "SELECT COUNT(*) FROM documents WHERE file_path LIKE ? ESCAPE '\\'",
        [pattern],
        |row| row.get(0),
    )
    .map_err(|e| BackendError::Database(format!("failed to count documents: {e}")).into())
}

/// Delete chunks whose `file_path` starts with a prefix. Returns the number
/// deleted.
///
/// # Errors
///
/// Returns an error if the deletion fails.
pub fn clear_documents_by_prefix(conn: &Connection, prefix: &str) -> Result<u64> {
    let pattern = format!("{}%", escape_like(prefix));

    let ids: Vec<i64> = {
        let mut stmt = conn
            .prepare("SELECT id FROM documents WHERE file_path LIKE ? ESCAPE '\\'")
            .map_err(|e| BackendError::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([&pattern], |row| row.get(0))
            .map_err(|e| BackendError::Database(format!("failed to query: {e}")))?;

        rows.flatten().collect()
    };

    for id in &ids {
        let _ = delete_vector(conn, DOCUMENT_VEC_TABLE, *id);
    }

    let count = conn
        .execute(
            "DELETE FROM documents WHERE file_path LIKE ? ESCAPE '\\'",
            [&pattern],
        )
        .map_err(|e| BackendError::Database(format!("failed to clear documents: {e}")))?;

    tracing::info!(prefix, count, "Cleared document chunks by prefix");
    Ok(count as u64)
}

/// Get all chunks for a file, ordered by chunk index.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_documents_by_file(conn: &Connection, file_path: &str) -> Result<Vec<DocumentChunk>> {
    let mut stmt = conn
        .prepare(
            "SELECT document_id, file_path, content_hash, modified_at,
                    chunk_index, total_chunks, text, original_path
             FROM documents
             WHERE file_path = ?
             ORDER BY chunk_index",
        )
        .map_err(|e| BackendError::Database(format!("failed to prepare query: {e}")))?;

    let rows = stmt
        .query_map([file_path], map_document_row)
        .map_err(|e| BackendError::Database(format!("failed to query documents: {e}")))?;

    let mut result = Vec::new();
    for row in rows {
        result.push(
            row.map_err(|e| BackendError::Database(format!("failed to read document: {e}")))?,
        );
    }
    Ok(result)
}

/// Get a single chunk by rowid.
///
/// # Errors
///
/// Returns an error if the chunk is missing or the query fails.
pub fn get_document_by_rowid(conn: &Connection, id: i64) -> Result<DocumentChunk> {
    conn.query_row(
        "SELECT document_id, file_path, content_hash, modified_at,
                chunk_index, total_chunks, text, original_path
         FROM documents
         WHERE id = ?",
        [id],
        map_document_row,
    )
    .map_err(|e| BackendError::Database(format!("failed to get document {id}: {e}")).into())
}

fn map_document_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentChunk> {
    Ok(DocumentChunk {
        document_id: row.get(0)?,
        file_path: row.get(1)?,
        content_hash: row.get(2)?,
        modified_at: row.get(3)?,
        chunk_index: row.get(4)?,
        total_chunks: row.get(5)?,
        text: row.get(6)?,
        metadata: ChunkMetadata {
            original_path: row.get(7)?,
        },
        embedding: None,
    })
}

/// Escape LIKE wildcards in a literal prefix.
fn escape_like(prefix: &str) -> String {
    prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{migrate, Database};

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        // Vec table is skipped: unit tests exercise rows only, and vector
        // deletes on a missing table are ignored by design.
        db.with_conn(migrate).unwrap();
        db
    }

    fn chunk(path: &str, index: u32, total: u32) -> DocumentChunk {
        DocumentChunk::new(path, "hash", 1.0, index, total, format!("text {index}"))
    }

    #[test]
    fn test_upsert_and_get() {
        let db = setup_db();

        db.with_conn(|conn| {
            upsert_document(conn, &chunk("/p/a.txt", 0, 2), None)?;
            upsert_document(conn, &chunk("/p/a.txt", 1, 2), None)?;

            let docs = get_documents_by_file(conn, "/p/a.txt")?;
            assert_eq!(docs.len(), 2);
            assert_eq!(docs[0].document_id, "/p/a.txt::0");
            assert_eq!(docs[1].document_id, "/p/a.txt::1");
            assert_eq!(docs[0].metadata.original_path, "/p/a.txt");
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_upsert_same_id_does_not_duplicate() {
        let db = setup_db();

        db.with_conn(|conn| {
            upsert_document(conn, &chunk("/p/a.txt", 0, 1), None)?;
            upsert_document(conn, &chunk("/p/a.txt", 0, 1), None)?;

            assert_eq!(count_documents_by_prefix(conn, "/p/")?, 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_delete_by_file_is_exact() {
        let db = setup_db();

        db.with_conn(|conn| {
            upsert_document(conn, &chunk("/p/a.txt", 0, 1), None)?;
            upsert_document(conn, &chunk("/p/a.txt.bak", 0, 1), None)?;

            let deleted = delete_documents_by_file(conn, "/p/a.txt")?;
            assert_eq!(deleted, 1);

            assert!(get_documents_by_file(conn, "/p/a.txt")?.is_empty());
            assert_eq!(get_documents_by_file(conn, "/p/a.txt.bak")?.len(), 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_delete_missing_file_is_noop() {
        let db = setup_db();

        db.with_conn(|conn| {
            let deleted = delete_documents_by_file(conn, "/p/missing.txt")?;
            assert_eq!(deleted, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_count_and_clear_by_prefix() {
        let db = setup_db();

        db.with_conn(|conn| {
            upsert_document(conn, &chunk("/p/a.txt", 0, 1), None)?;
            upsert_document(conn, &chunk("/p/sub/b.txt", 0, 1), None)?;
            upsert_document(conn, &chunk("/other/c.txt", 0, 1), None)?;

            assert_eq!(count_documents_by_prefix(conn, "/p/")?, 2);

            let cleared = clear_documents_by_prefix(conn, "/p/")?;
            assert_eq!(cleared, 2);
            assert_eq!(count_documents_by_prefix(conn, "/p/")?, 0);
            assert_eq!(count_documents_by_prefix(conn, "/other/")?, 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_prefix_wildcards_are_literal() {
        let db = setup_db();

        db.with_conn(|conn| {
            upsert_document(conn, &chunk("/p/a_b.txt", 0, 1), None)?;
            upsert_document(conn, &chunk("/p/axb.txt", 0, 1), None)?;

            // '_' must match literally, not as a single-char wildcard
            assert_eq!(count_documents_by_prefix(conn, "/p/a_b")?, 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_rowid_lookup() {
        let db = setup_db();

        db.with_conn(|conn| {
            let id = upsert_document(conn, &chunk("/p/a.txt", 0, 1), None)?;
            assert_eq!(rowid_for_document(conn, "/p/a.txt::0")?, Some(id));
            assert_eq!(rowid_for_document(conn, "/p/a.txt::1")?, None);

            let doc = get_document_by_rowid(conn, id)?;
            assert_eq!(doc.document_id, "/p/a.txt::0");
            Ok(())
        })
        .unwrap();
    }
}
