//! ONNX-based embedding generation.
//!
//! This module provides:
//! - ONNX Runtime integration via the `ort` crate
//! - A dedicated thread pool for inference, bridged to async via channels
//! - A deterministic hashed embedding fallback for tests and offline use

mod model;
mod service;
mod worker;

pub use model::{EmbeddingModel, DEFAULT_MODEL_NAME, EMBEDDING_DIM, MAX_SEQ_LENGTH};
pub use service::{hashed_embedding, EmbeddingConfig, EmbeddingService};
pub use worker::EmbeddingWorker;
