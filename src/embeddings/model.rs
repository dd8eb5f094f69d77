//! ONNX embedding model management.
//!
//! Handles loading the sentence-embedding model used to vectorize chunks.

use std::path::{Path, PathBuf};

use ort::session::builder::GraphOptimizationLevel;
use ort::session::builder::SessionBuilder;
use ort::session::Session;

use crate::error::BackendError;
use crate::Result;

/// Default model file name.
pub const DEFAULT_MODEL_NAME: &str = "all-MiniLM-L6-v2.onnx";

/// Embedding dimension for all-MiniLM-L6-v2.
pub const EMBEDDING_DIM: usize = 384;

/// Maximum sequence length for the model.
pub const MAX_SEQ_LENGTH: usize = 256;

/// ONNX embedding model wrapper.
pub struct EmbeddingModel {
    session: Session,
    model_path: PathBuf,
}

impl EmbeddingModel {
    /// Load an ONNX embedding model from the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded.
    pub fn load(model_path: impl AsRef<Path>) -> Result<Self> {
        let model_path = model_path.as_ref().to_path_buf();

        if !model_path.exists() {
            return Err(BackendError::Embedding(format!(
                "model file not found: {}",
                model_path.display()
            ))
            .into());
        }

        tracing::info!(path = %model_path.display(), "Loading ONNX embedding model");

        let session = SessionBuilder::new()
            .map_err(|e| BackendError::Embedding(format!("failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| BackendError::Embedding(format!("failed to set optimization level: {e}")))?
            .with_intra_threads(1)
            .map_err(|e| BackendError::Embedding(format!("failed to set threads: {e}")))?
            .commit_from_file(&model_path)
            .map_err(|e| BackendError::Embedding(format!("failed to load model: {e}")))?;

        tracing::info!(
            path = %model_path.display(),
            inputs = session.inputs().len(),
            outputs = session.outputs().len(),
            "Model loaded successfully"
        );

        Ok(Self {
            session,
            model_path,
        })
    }

    /// Load the default model from a models directory.
    ///
    /// Looks for the model at `{models_dir}/{DEFAULT_MODEL_NAME}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be found or loaded.
    pub fn load_default(models_dir: impl AsRef<Path>) -> Result<Self> {
        Self::load(models_dir.as_ref().join(DEFAULT_MODEL_NAME))
    }

    /// Consume the wrapper and take the session for worker threads.
    #[must_use]
    pub fn into_session(self) -> Session {
        self.session
    }

    /// Get the model path.
    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Get the expected embedding dimension.
    #[must_use]
    pub const fn embedding_dim(&self) -> usize {
        EMBEDDING_DIM
    }
}

impl std::fmt::Debug for EmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingModel")
            .field("model_path", &self.model_path)
            .field("embedding_dim", &EMBEDDING_DIM)
            .finish_non_exhaustive()
    }
}
