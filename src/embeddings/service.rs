//! High-level embedding service.
//!
//! Provides a convenient async API for generating embeddings, with a
//! deterministic hashed provider for tests and offline development.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::model::{EmbeddingModel, DEFAULT_MODEL_NAME, EMBEDDING_DIM};
use super::worker::{load_tokenizer, EmbeddingWorker};
use crate::error::BackendError;
use crate::Result;

/// Embedding service configuration.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Path to ONNX model file.
    pub model_path: std::path::PathBuf,

    /// Path to tokenizer.json file.
    pub tokenizer_path: std::path::PathBuf,

    /// Number of worker threads.
    pub num_workers: usize,
}

impl EmbeddingConfig {
    /// Create config from the index data directory.
    ///
    /// Expects the model at `{index_dir}/models/all-MiniLM-L6-v2.onnx`
    /// and the tokenizer at `{index_dir}/models/tokenizer.json`.
    #[must_use]
    pub fn from_index_dir(index_dir: impl AsRef<Path>, num_workers: usize) -> Self {
        let models_dir = index_dir.as_ref().join("models");
        Self {
            model_path: models_dir.join(DEFAULT_MODEL_NAME),
            tokenizer_path: models_dir.join("tokenizer.json"),
            num_workers,
        }
    }
}

enum Provider {
    /// Real ONNX inference via the worker pool.
    Onnx(EmbeddingWorker),
    /// Deterministic embeddings derived from a text hash.
    Hashed,
}

/// High-level embedding service.
///
/// Thread-safe and can be cloned cheaply.
#[derive(Clone)]
pub struct EmbeddingService {
    inner: Arc<EmbeddingServiceInner>,
}

struct EmbeddingServiceInner {
    provider: RwLock<Option<Provider>>,
    config: Option<EmbeddingConfig>,
    initialized: std::sync::atomic::AtomicBool,
}

impl EmbeddingService {
    /// Create a new ONNX-backed embedding service.
    ///
    /// The service is created but not initialized. Call `init()` to load the
    /// model and start workers.
    #[must_use]
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            inner: Arc::new(EmbeddingServiceInner {
                provider: RwLock::new(None),
                config: Some(config),
                initialized: std::sync::atomic::AtomicBool::new(false),
            }),
        }
    }

    /// Create a service backed by deterministic hashed embeddings.
    ///
    /// Immediately initialized; no model files required. Intended for tests
    /// and offline development.
    #[must_use]
    pub fn hashed() -> Self {
        Self {
            inner: Arc::new(EmbeddingServiceInner {
                provider: RwLock::new(Some(Provider::Hashed)),
                config: None,
                initialized: std::sync::atomic::AtomicBool::new(true),
            }),
        }
    }

    /// Initialize the embedding service.
    ///
    /// Loads the model and starts worker threads. A failure here is a
    /// configuration failure: the caller must treat it as fatal.
    ///
    /// # Errors
    ///
    /// Returns an error if the model or tokenizer cannot be loaded.
    pub async fn init(&self) -> Result<()> {
        {
            let mut provider_guard = self.inner.provider.write().await;

            if provider_guard.is_some() {
                return Ok(()); // Already initialized
            }

            let config = self.inner.config.as_ref().ok_or_else(|| {
                BackendError::Embedding("service constructed without config".to_string())
            })?;

            tracing::info!("Initializing embedding service");

            let model = EmbeddingModel::load(&config.model_path)?;
            let tokenizer = load_tokenizer(&config.tokenizer_path)?;

            let worker = EmbeddingWorker::new(
                model.into_session(),
                Arc::new(tokenizer),
                config.num_workers,
            )?;

            *provider_guard = Some(Provider::Onnx(worker));
        }
        self.inner
            .initialized
            .store(true, std::sync::atomic::Ordering::Release);

        tracing::info!("Embedding service initialized");
        Ok(())
    }

    /// Check if the service is initialized.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner
            .initialized
            .load(std::sync::atomic::Ordering::Acquire)
    }

    /// The dimension of produced embeddings.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    /// Generate embedding for a single text.
    ///
    /// # Errors
    ///
    /// Returns an error if not initialized or embedding fails.
    pub async fn embed_one(&self, text: impl Into<String>) -> Result<Vec<f32>> {
        let text = text.into();
        let provider_guard = self.inner.provider.read().await;
        match provider_guard.as_ref() {
            Some(Provider::Onnx(worker)) => worker.embed_one(text).await,
            Some(Provider::Hashed) => Ok(hashed_embedding(&text)),
            None => {
                Err(BackendError::Embedding("service not initialized".to_string()).into())
            }
        }
    }

    /// Generate embeddings for multiple texts.
    ///
    /// # Errors
    ///
    /// Returns an error if not initialized or embedding fails.
    pub async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let provider_guard = self.inner.provider.read().await;
        match provider_guard.as_ref() {
            Some(Provider::Onnx(worker)) => worker.embed(texts).await,
            Some(Provider::Hashed) => {
                Ok(texts.iter().map(|t| hashed_embedding(t)).collect())
            }
            None => {
                Err(BackendError::Embedding("service not initialized".to_string()).into())
            }
        }
    }
}

impl std::fmt::Debug for EmbeddingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingService")
            .field("initialized", &self.is_initialized())
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Create a deterministic embedding from a text hash.
///
/// Same text always produces the same L2-normalized vector; different texts
/// almost always differ.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn hashed_embedding(text: &str) -> Vec<f32> {
    let digest = blake3::hash(text.as_bytes());
    let bytes = digest.as_bytes();

    // Expand the 32-byte digest into a 384-dim vector with an LCG
    let mut seed = u64::from_le_bytes(bytes[..8].try_into().unwrap_or([0; 8]));
    let mut embedding = Vec::with_capacity(EMBEDDING_DIM);
    for _ in 0..EMBEDDING_DIM {
        seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        let value = (((seed >> 33) as f32) / (u32::MAX as f32)).mul_add(2.0, -1.0);
        embedding.push(value);
    }

    // L2 normalize
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut embedding {
            *v /= norm;
        }
    }

    embedding
}
