//! Configuration settings and validation.

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Default chunk window size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 2048;

/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 512;

/// Main configuration for the Semdex server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the project directory to index and watch.
    pub project_root: PathBuf,

    /// Directory for the `SQLite` index and model files. Always excluded
    /// from indexing.
    pub index_dir: PathBuf,

    /// Host address to bind to.
    pub host: String,

    /// Port to listen on.
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Extra gitignore-style patterns, evaluated before `.gitignore`.
    pub ignore_patterns: Vec<String>,

    /// Chunk window size in characters.
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters.
    pub chunk_overlap: usize,

    /// Maximum number of embedding worker threads.
    pub embedding_threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            index_dir: PathBuf::from("./.semdex"),
            host: "127.0.0.1".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            ignore_patterns: vec![
                ".git".to_string(),
                "__pycache__".to_string(),
                "*.pyc".to_string(),
            ],
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            embedding_threads: std::thread::available_parallelism()
                .map(|n| n.get().min(4))
                .unwrap_or(4),
        }
    }
}

impl Config {
    /// Create a new configuration with defaults for the given project root.
    #[must_use]
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let project_root = project_root.as_ref().to_path_buf();
        let index_dir = project_root.join(".semdex");
        Self {
            project_root,
            index_dir,
            ..Default::default()
        }
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::config("port cannot be 0"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.host.is_empty() {
            return Err(Error::config("host cannot be empty"));
        }

        if self.chunk_size == 0 {
            return Err(Error::config("chunk_size cannot be 0"));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }

        if self.embedding_threads == 0 {
            return Err(Error::config("embedding_threads cannot be 0"));
        }

        if self.embedding_threads > 32 {
            return Err(Error::config(
                "embedding_threads cannot exceed 32 (hardware limit)",
            ));
        }

        Ok(())
    }

    /// Get the path to the `SQLite` database file.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.index_dir.join("semdex.db")
    }

    /// Get the server address as a string.
    #[must_use]
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "127.0.0.1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_for_project_places_index_dir_inside_root() {
        let config = Config::for_project("/work/proj");
        assert_eq!(config.project_root, PathBuf::from("/work/proj"));
        assert_eq!(config.index_dir, PathBuf::from("/work/proj/.semdex"));
    }

    #[test]
    fn test_validate_invalid_port() {
        let config = Config {
            port: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let config = Config {
            log_level: "invalid".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log level"));
    }

    #[test]
    fn test_validate_overlap_must_be_smaller_than_size() {
        let config = Config {
            chunk_size: 100,
            chunk_overlap: 100,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));

        let config = Config {
            chunk_size: 100,
            chunk_overlap: 99,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_chunk_size() {
        let config = Config {
            chunk_size: 0,
            chunk_overlap: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("chunk_size"));
    }

    #[test]
    fn test_validate_invalid_embedding_threads() {
        let config = Config {
            embedding_threads: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            embedding_threads: 100,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("32"));
    }

    #[test]
    fn test_validate_empty_host() {
        let config = Config {
            host: String::new(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("host"));
    }

    #[test]
    fn test_database_path() {
        let config = Config {
            index_dir: PathBuf::from("/var/lib/semdex"),
            ..Default::default()
        };
        assert_eq!(
            config.database_path(),
            PathBuf::from("/var/lib/semdex/semdex.db")
        );
    }

    #[test]
    fn test_server_addr() {
        let config = Config {
            host: "0.0.0.0".to_string(),
            port: 9090,
            ..Default::default()
        };
        assert_eq!(config.server_addr(), "0.0.0.0:9090");
    }

    #[test]
    fn test_all_log_levels_valid() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            let config = Config {
                log_level: level.to_string(),
                ..Default::default()
            };
            assert!(config.validate().is_ok(), "Level '{level}' should be valid");
        }
    }
}
