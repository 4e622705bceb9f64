//! Error taxonomy for the QA pipeline.
//!
//! The pipeline distinguishes fatal configuration problems from
//! external-collaborator failures (embedding, generation, store
//! transport) and from recoverable per-file ingestion errors. Callers
//! must never conflate "no sufficiently similar content" (an empty
//! search result) with [`PipelineError::Retrieval`] — the former is a
//! normal outcome and is not represented here at all.

use thiserror::Error;

/// All failure modes surfaced by the pipeline core.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid chunking parameters, dimension mismatch, or other
    /// misconfiguration. Fatal — detected before any processing.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The embedding endpoint failed (transport or model error). No
    /// partial results are accepted; a batch either fully succeeds or
    /// the whole call fails with this variant.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The generation endpoint failed. The caller must not fabricate
    /// an answer when this is returned.
    #[error("generation failed: {0}")]
    Generation(String),

    /// The vector store transport failed. Distinct from an empty
    /// search result, which is `Ok(vec![])`.
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    /// A single source file could not be read during ingestion.
    /// Recovered locally: the file is skipped and the batch continues.
    #[error("failed to ingest {path}: {reason}")]
    IngestionFile { path: String, reason: String },
}

impl From<sqlx::Error> for PipelineError {
    fn from(e: sqlx::Error) -> Self {
        PipelineError::Retrieval(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
