//! Embedding gateway: batched calls to the hosted inference endpoint.
//!
//! The [`Embedder`] trait is the seam between the pipeline and the
//! black-box embedding service; [`HfEmbedder`] is the production
//! implementation over the Hugging Face Inference API.
//!
//! # Batching
//!
//! Large inputs are split into fixed-size batches to respect transport
//! limits. Results are written back into output slots indexed by batch
//! position — never by arrival order — so input order is preserved.
//! A batch either fully succeeds or the whole call fails; no partial
//! results are accepted.
//!
//! # Retry strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use async_trait::async_trait;
use std::time::Duration;

use crate::config::InferenceConfig;
use crate::error::{PipelineError, Result};

/// Black-box embedding service: texts in, equal-length vectors out.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning one vector per input text in
    /// the same order. Every vector has [`dims`](Embedder::dims)
    /// components.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Configured embedding dimensionality.
    fn dims(&self) -> usize;
}

/// Embed a single query text.
///
/// Convenience wrapper around [`Embedder::embed`] for query-time use.
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    let results = embedder.embed(&[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::Embedding("empty embedding response".to_string()))
}

/// Embedding provider calling the Hugging Face Inference API
/// feature-extraction pipeline.
///
/// Requires the `HF_TOKEN` environment variable.
pub struct HfEmbedder {
    model: String,
    dims: usize,
    api_token: String,
    batch_size: usize,
    max_retries: u32,
    timeout_secs: u64,
}

impl HfEmbedder {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let api_token = std::env::var("HF_TOKEN").map_err(|_| {
            PipelineError::Configuration("HF_TOKEN environment variable not set".to_string())
        })?;

        if config.embedding_dims == 0 {
            return Err(PipelineError::Configuration(
                "inference.embedding_dims must be > 0".to_string(),
            ));
        }

        Ok(Self {
            model: config.embedding_model.clone(),
            dims: config.embedding_dims,
            api_token,
            batch_size: config.batch_size,
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Call the feature-extraction endpoint for one batch, with
    /// retry/backoff on transient failures.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Embedding(e.to_string()))?;

        let url = format!(
            "https://api-inference.huggingface.co/pipeline/feature-extraction/{}",
            self.model
        );
        let body = serde_json::json!({ "inputs": texts });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post(&url)
                .bearer_auth(&self.api_token)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let vectors: Vec<Vec<f32>> = response
                            .json()
                            .await
                            .map_err(|e| PipelineError::Embedding(e.to_string()))?;
                        return Ok(vectors);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let text = response.text().await.unwrap_or_default();
                        last_err = Some(format!("inference API error {}: {}", status, text));
                        continue;
                    }

                    let text = response.text().await.unwrap_or_default();
                    return Err(PipelineError::Embedding(format!(
                        "inference API error {}: {}",
                        status, text
                    )));
                }
                Err(e) => {
                    last_err = Some(e.to_string());
                    continue;
                }
            }
        }

        Err(PipelineError::Embedding(last_err.unwrap_or_else(|| {
            "embedding failed after retries".to_string()
        })))
    }
}

/// Write one batch's vectors into the output slots addressed by batch
/// position, not arrival order. Validates batch length and vector
/// dimensions before any slot is touched.
fn place_batch(
    out: &mut [Vec<f32>],
    batch_idx: usize,
    batch_size: usize,
    expected_len: usize,
    dims: usize,
    vectors: Vec<Vec<f32>>,
) -> Result<()> {
    if vectors.len() != expected_len {
        return Err(PipelineError::Embedding(format!(
            "batch returned {} vectors for {} inputs",
            vectors.len(),
            expected_len
        )));
    }

    for (i, vector) in vectors.into_iter().enumerate() {
        if vector.len() != dims {
            return Err(PipelineError::Configuration(format!(
                "embedding dimension mismatch: got {}, expected {}",
                vector.len(),
                dims
            )));
        }
        out[batch_idx * batch_size + i] = vector;
    }

    Ok(())
}

#[async_trait]
impl Embedder for HfEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out: Vec<Vec<f32>> = vec![Vec::new(); texts.len()];

        for (batch_idx, batch) in texts.chunks(self.batch_size).enumerate() {
            let vectors = self.embed_batch(batch).await?;
            place_batch(
                &mut out,
                batch_idx,
                self.batch_size,
                batch.len(),
                self.dims,
                vectors,
            )?;
        }

        Ok(out)
    }

    fn dims(&self) -> usize {
        self.dims
    }
}

/// Placeholder embedder that fails on use.
///
/// Used for code paths that need an [`Embedder`] but never embed, such
/// as dry-run ingestion.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(PipelineError::Embedding(
            "no embedding provider configured".to_string(),
        ))
    }

    fn dims(&self) -> usize {
        0
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`: 1 = identical direction,
/// 0 = orthogonal, -1 = opposite. Empty or mismatched-length inputs
/// yield `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// Each `f32` is stored as 4 bytes in little-endian order, producing a
/// BLOB of `vec.len() × 4` bytes for SQLite storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        assert_eq!(blob.len(), 20);
        assert_eq!(blob_to_vec(&blob), vec);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty_and_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_place_batch_preserves_input_order() {
        // 5 inputs, batch size 2: batches arrive out of order, yet each
        // vector lands in the slot of its original input position.
        let mut out: Vec<Vec<f32>> = vec![Vec::new(); 5];

        place_batch(&mut out, 2, 2, 1, 1, vec![vec![5.0]]).unwrap();
        place_batch(&mut out, 0, 2, 2, 1, vec![vec![1.0], vec![2.0]]).unwrap();
        place_batch(&mut out, 1, 2, 2, 1, vec![vec![3.0], vec![4.0]]).unwrap();

        assert_eq!(
            out,
            vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0], vec![5.0]]
        );
    }

    #[test]
    fn test_place_batch_rejects_short_batch() {
        let mut out: Vec<Vec<f32>> = vec![Vec::new(); 4];
        let err = place_batch(&mut out, 0, 2, 2, 1, vec![vec![1.0]]).unwrap_err();
        assert!(matches!(err, PipelineError::Embedding(_)));
    }

    #[test]
    fn test_place_batch_rejects_wrong_dims() {
        let mut out: Vec<Vec<f32>> = vec![Vec::new(); 2];
        let err = place_batch(&mut out, 0, 2, 2, 3, vec![vec![1.0], vec![2.0]]).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
