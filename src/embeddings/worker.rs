//! Embedding worker thread pool.
//!
//! Runs ONNX inference in dedicated threads to avoid blocking the async
//! runtime; requests are bridged with a bounded channel and oneshot replies.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use ort::session::Session;
use ort::value::Value;
use parking_lot::Mutex;
use tokenizers::Tokenizer;

use super::model::{EMBEDDING_DIM, MAX_SEQ_LENGTH};
use crate::error::BackendError;
use crate::Result;

/// Request to generate embeddings.
struct EmbeddingRequest {
    texts: Vec<String>,
    response_tx: tokio::sync::oneshot::Sender<Result<Vec<Vec<f32>>>>,
}

/// Worker pool for embedding generation.
pub struct EmbeddingWorker {
    request_tx: Sender<EmbeddingRequest>,
    _workers: Vec<std::thread::JoinHandle<()>>,
}

impl EmbeddingWorker {
    /// Create a new embedding worker pool.
    ///
    /// The session is shared across workers; inference is serialized on it
    /// while tokenization runs in parallel.
    ///
    /// # Errors
    ///
    /// Returns an error if worker threads cannot be spawned.
    pub fn new(session: Session, tokenizer: Arc<Tokenizer>, num_workers: usize) -> Result<Self> {
        let (request_tx, request_rx): (Sender<EmbeddingRequest>, Receiver<EmbeddingRequest>) =
            bounded(100);

        let request_rx = Arc::new(Mutex::new(request_rx));
        let session = Arc::new(Mutex::new(session));
        let mut workers = Vec::with_capacity(num_workers);

        for i in 0..num_workers {
            let session = Arc::clone(&session);
            let tokenizer = Arc::clone(&tokenizer);
            let rx = Arc::clone(&request_rx);

            let handle = std::thread::Builder::new()
                .name(format!("embedding-worker-{i}"))
                .spawn(move || {
                    worker_loop(&session, &tokenizer, &rx);
                })
                .map_err(|e| {
                    BackendError::Embedding(format!("failed to spawn worker: {e}"))
                })?;

            workers.push(handle);
        }

        tracing::info!(num_workers, "Embedding worker pool started");

        Ok(Self {
            request_tx,
            _workers: workers,
        })
    }

    /// Generate embeddings for texts asynchronously.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails.
    pub async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let (response_tx, response_rx) = tokio::sync::oneshot::channel();

        let request = EmbeddingRequest { texts, response_tx };

        self.request_tx
            .send(request)
            .map_err(|_| BackendError::Embedding("worker pool closed".to_string()))?;

        response_rx
            .await
            .map_err(|_| BackendError::Embedding("worker dropped response".to_string()))?
    }

    /// Generate embedding for a single text.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails.
    pub async fn embed_one(&self, text: String) -> Result<Vec<f32>> {
        let results = self.embed(vec![text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Embedding("no embedding returned".to_string()).into())
    }
}

/// Worker loop that processes embedding requests.
fn worker_loop(
    session: &Arc<Mutex<Session>>,
    tokenizer: &Tokenizer,
    request_rx: &Arc<Mutex<Receiver<EmbeddingRequest>>>,
) {
    loop {
        let request = {
            let rx = request_rx.lock();
            if let Ok(req) = rx.recv() {
                req
            } else {
                tracing::debug!("Embedding worker shutting down");
                return;
            }
        };

        let result = process_request(session, tokenizer, &request.texts);

        // Receiver may have been dropped; nothing to do then
        let _ = request.response_tx.send(result);
    }
}

/// Tokenize a batch, run inference, and mean-pool the hidden states.
#[allow(clippy::cast_possible_wrap)]
fn process_request(
    session: &Arc<Mutex<Session>>,
    tokenizer: &Tokenizer,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let encodings = tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| BackendError::Embedding(format!("failed to tokenize: {e}")))?;

    let batch_size = encodings.len();
    let max_len = encodings
        .iter()
        .map(|e| e.get_ids().len())
        .max()
        .unwrap_or(0)
        .min(MAX_SEQ_LENGTH)
        .max(1);

    // BERT-style models take i64 input tensors
    let mut input_ids_vec: Vec<i64> = vec![0; batch_size * max_len];
    let mut attention_mask_vec: Vec<i64> = vec![0; batch_size * max_len];
    let mut token_type_ids_vec: Vec<i64> = vec![0; batch_size * max_len];

    for (i, encoding) in encodings.iter().enumerate() {
        let ids = encoding.get_ids();
        let mask = encoding.get_attention_mask();
        let types = encoding.get_type_ids();

        let len = ids.len().min(max_len);
        for j in 0..len {
            input_ids_vec[i * max_len + j] = i64::from(ids[j]);
            attention_mask_vec[i * max_len + j] = i64::from(mask[j]);
            token_type_ids_vec[i * max_len + j] = i64::from(types[j]);
        }
    }

    let shape = vec![batch_size as i64, max_len as i64];

    let input_ids = Value::from_array((shape.as_slice(), input_ids_vec))
        .map_err(|e| BackendError::Embedding(format!("failed to create input_ids: {e}")))?;
    let attention = Value::from_array((shape.as_slice(), attention_mask_vec.clone()))
        .map_err(|e| BackendError::Embedding(format!("failed to create attention_mask: {e}")))?;
    let token_types = Value::from_array((shape.as_slice(), token_type_ids_vec))
        .map_err(|e| BackendError::Embedding(format!("failed to create token_type_ids: {e}")))?;

    let mut session = session.lock();
    let outputs = session
        .run(ort::inputs![
            "input_ids" => input_ids,
            "attention_mask" => attention,
            "token_type_ids" => token_types,
        ])
        .map_err(|e| BackendError::Embedding(format!("inference failed: {e}")))?;

    let (out_shape, hidden) = outputs["last_hidden_state"]
        .try_extract_tensor::<f32>()
        .map_err(|e| BackendError::Embedding(format!("failed to extract output: {e}")))?;

    let hidden_size = usize::try_from(out_shape[out_shape.len() - 1])
        .map_err(|e| BackendError::Embedding(format!("bad output shape: {e}")))?;

    let mut embeddings = Vec::with_capacity(batch_size);
    for i in 0..batch_size {
        let start = i * max_len * hidden_size;
        let end = start + max_len * hidden_size;
        let mask = &attention_mask_vec[i * max_len..(i + 1) * max_len];
        embeddings.push(mean_pool_embedding(
            &hidden[start..end],
            mask,
            max_len,
            hidden_size,
        ));
    }

    Ok(embeddings)
}

/// Apply mean pooling with attention mask, then L2-normalize.
fn mean_pool_embedding(
    hidden_states: &[f32],
    attention_mask: &[i64],
    seq_len: usize,
    hidden_size: usize,
) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden_size];
    let mut count = 0.0f32;

    for (i, &mask) in attention_mask.iter().take(seq_len).enumerate() {
        if mask == 1 {
            for (j, s) in sum.iter_mut().enumerate() {
                *s += hidden_states[i * hidden_size + j];
            }
            count += 1.0;
        }
    }

    if count > 0.0 {
        for s in &mut sum {
            *s /= count;
        }
    }

    let norm: f32 = sum.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for s in &mut sum {
            *s /= norm;
        }
    }

    sum
}

/// Load tokenizer from file.
///
/// # Errors
///
/// Returns an error if the tokenizer cannot be loaded.
pub fn load_tokenizer(path: impl AsRef<std::path::Path>) -> Result<Tokenizer> {
    Tokenizer::from_file(path.as_ref())
        .map_err(|e| BackendError::Embedding(format!("failed to load tokenizer: {e}")).into())
}
