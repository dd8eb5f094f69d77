//! Text chunking for indexing.
//!
//! Splits file content into fixed-size overlapping character windows. The
//! windows are what the index stores and searches; overlap keeps phrases
//! that straddle a window boundary findable.

use crate::{Error, Result};

/// Chunking configuration.
#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    /// Target window size in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive windows in characters.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: crate::config::DEFAULT_CHUNK_SIZE,
            overlap: crate::config::DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Character-window text chunker.
#[derive(Debug, Clone)]
pub struct TextChunker {
    config: ChunkerConfig,
}

impl TextChunker {
    /// Create a new chunker with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the overlap is not smaller than the window size.
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(Error::config("chunk_size cannot be 0"));
        }
        if config.overlap >= config.chunk_size {
            return Err(Error::config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                config.overlap, config.chunk_size
            )));
        }
        Ok(Self { config })
    }

    /// Create a chunker with default config.
    #[must_use]
    pub fn default_chunker() -> Self {
        Self {
            config: ChunkerConfig::default(),
        }
    }

    /// Split content into ordered, 0-indexed overlapping windows.
    ///
    /// Empty input yields no chunks. Non-empty input always yields at least
    /// one chunk, even when shorter than a single window. Window boundaries
    /// fall on character boundaries, never inside a multi-byte sequence.
    #[must_use]
    pub fn chunk(&self, content: &str) -> Vec<String> {
        if content.is_empty() {
            return Vec::new();
        }

        // Byte offset of every char boundary, plus the end of the string.
        let mut boundaries: Vec<usize> = content.char_indices().map(|(i, _)| i).collect();
        boundaries.push(content.len());
        let char_count = boundaries.len() - 1;

        if char_count <= self.config.chunk_size {
            return vec![content.to_string()];
        }

        let step = self.config.chunk_size - self.config.overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < char_count {
            let end = (start + self.config.chunk_size).min(char_count);
            chunks.push(content[boundaries[start]..boundaries[end]].to_string());

            if end >= char_count {
                break;
            }
            // step >= 1 is guaranteed by the constructor invariant
            start += step;
        }

        chunks
    }

    /// Window size in characters.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.config.chunk_size
    }

    /// Overlap in characters.
    #[must_use]
    pub const fn overlap(&self) -> usize {
        self.config.overlap
    }
}
