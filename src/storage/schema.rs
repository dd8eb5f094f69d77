//! Database schema definitions and migrations.
//!
//! Provides versioned schema migrations for safe database upgrades.

use rusqlite::Connection;

use crate::error::BackendError;
use crate::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if migrations fail.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| BackendError::Migration(format!("failed to create migrations table: {e}")))?;

    let current_version = get_current_version(conn)?;
    tracing::debug!(
        current = current_version,
        target = SCHEMA_VERSION,
        "Checking database migrations"
    );

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Get the current schema version.
fn get_current_version(conn: &Connection) -> Result<i32> {
    let result = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    );

    match result {
        Ok(version) => Ok(version),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(BackendError::Migration(format!("failed to get version: {e}")).into()),
    }
}

/// Initial schema: the documents table.
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY,
            document_id TEXT NOT NULL UNIQUE,
            file_path TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            modified_at REAL NOT NULL,
            chunk_index INTEGER NOT NULL,
            total_chunks INTEGER NOT NULL,
            text TEXT NOT NULL,
            original_path TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_documents_file_path ON documents(file_path);
        ",
    )
    .map_err(|e| BackendError::Migration(format!("migration v1 failed: {e}")))?;

    record_migration(conn, 1)?;
    tracing::info!("Applied migration v1 (documents table)");
    Ok(())
}

/// Record an applied migration.
fn record_migration(conn: &Connection, version: i32) -> Result<()> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(0))
        .unwrap_or(0);

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?, ?)",
        rusqlite::params![version, now],
    )
    .map_err(|e| BackendError::Migration(format!("failed to record migration: {e}")))?;
    Ok(())
}

/// Verify the schema is at the expected version with expected tables.
///
/// # Errors
///
/// Returns an error if verification fails.
pub fn verify_schema(conn: &Connection) -> Result<()> {
    let version = get_current_version(conn)?;
    if version != SCHEMA_VERSION {
        return Err(BackendError::Migration(format!(
            "schema version mismatch: found {version}, expected {SCHEMA_VERSION}"
        ))
        .into());
    }

    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'documents'",
            [],
            |row| row.get(0),
        )
        .map_err(|e| BackendError::Migration(format!("failed to verify schema: {e}")))?;

    if count != 1 {
        return Err(BackendError::Migration("documents table missing".to_string()).into());
    }

    Ok(())
}
