//! Semdex - incremental semantic file index server
//!
//! Entry point for the Semdex server.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::sync::Arc;

use clap::Parser;
use semdex::chunker::{ChunkerConfig, TextChunker};
use semdex::coordinator::IndexCoordinator;
use semdex::embeddings::{EmbeddingConfig, EmbeddingService};
use semdex::index::VectorStore;
use semdex::server::{init_metrics, init_tracing, App, ServerConfig};
use semdex::storage::{init_sqlite_vec, Database};
use semdex::{Config, Result};

/// Semdex - incremental semantic file index server
#[derive(Parser, Debug)]
#[command(name = "semdex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project directory to index and watch
    #[arg(short, long, env = "SEMDEX_PROJECT_ROOT", default_value = ".")]
    project_root: std::path::PathBuf,

    /// Directory for the index database and model files
    /// (default: {project_root}/.semdex)
    #[arg(long, env = "SEMDEX_INDEX_DIR")]
    index_dir: Option<std::path::PathBuf>,

    /// Host address to bind to
    #[arg(long, env = "SEMDEX_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short = 'P', long, env = "SEMDEX_PORT", default_value = "8080")]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SEMDEX_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "SEMDEX_LOG_JSON")]
    log_json: bool,

    /// Extra gitignore-style ignore patterns
    #[arg(
        short,
        long,
        env = "SEMDEX_IGNORE_PATTERNS",
        value_delimiter = ',',
        default_values_t = [".git".to_string(), "__pycache__".to_string(), "*.pyc".to_string()]
    )]
    ignore: Vec<String>,

    /// Chunk window size in characters
    #[arg(long, env = "SEMDEX_CHUNK_SIZE", default_value = "2048")]
    chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    #[arg(long, env = "SEMDEX_CHUNK_OVERLAP", default_value = "512")]
    chunk_overlap: usize,

    /// Number of embedding worker threads
    #[arg(long, env = "SEMDEX_EMBEDDING_THREADS", default_value = "4")]
    embedding_threads: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.log_json);

    tracing::info!("Semdex v{} starting...", env!("CARGO_PKG_VERSION"));

    let index_dir = cli
        .index_dir
        .unwrap_or_else(|| cli.project_root.join(".semdex"));

    let config = Config {
        project_root: cli.project_root,
        index_dir,
        host: cli.host,
        port: cli.port,
        log_level: cli.log_level,
        ignore_patterns: cli.ignore,
        chunk_size: cli.chunk_size,
        chunk_overlap: cli.chunk_overlap,
        embedding_threads: cli.embedding_threads,
    };

    tracing::debug!(?config, "Configuration loaded");
    config.validate()?;

    tracing::info!(
        "Server will bind to {}:{}, index data in {:?}",
        config.host,
        config.port,
        config.index_dir
    );

    // Register sqlite-vec before any connection is opened
    init_sqlite_vec();
    init_metrics();

    let db = Database::open(config.database_path())?;
    let embeddings = EmbeddingService::new(EmbeddingConfig::from_index_dir(
        &config.index_dir,
        config.embedding_threads,
    ));
    let store = VectorStore::new(db, embeddings);

    let chunker = TextChunker::new(ChunkerConfig {
        chunk_size: config.chunk_size,
        overlap: config.chunk_overlap,
    })?;

    let coordinator = Arc::new(IndexCoordinator::new(
        &config.project_root,
        &config.index_dir,
        &config.ignore_patterns,
        chunker,
        Arc::new(store.clone()),
    )?);

    let server_config = ServerConfig {
        host: config.host,
        port: config.port,
        ..Default::default()
    };

    let app = App::new(server_config, coordinator, store);
    app.run().await
}
