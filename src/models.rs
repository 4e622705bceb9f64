//! Core data types that flow through the ingestion and query pipeline.

use serde::Serialize;

/// A bounded token window of a source document with provenance metadata.
///
/// Created by the chunker at ingestion time, enriched with an embedding
/// by the embedding gateway, and persisted immutably by the store.
///
/// Invariants: `end_token - start_token == token_count`, `token_count > 0`,
/// `content` is non-empty, and `chunk_id` values within one `source` are
/// `0, 1, 2, ...` in document order.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Decoded text of the token window.
    pub content: String,
    /// Identifier of the originating document (file name).
    pub source: String,
    /// Sequence number, unique within `source`, starting at 0.
    pub chunk_id: i64,
    /// Start of the half-open token range within the source token stream.
    pub start_token: usize,
    /// End of the half-open token range.
    pub end_token: usize,
    /// `end_token - start_token`.
    pub token_count: usize,
    /// Fixed-dimension embedding vector; `None` until the embedding
    /// gateway has run.
    pub embedding: Option<Vec<f32>>,
}

/// A chunk plus its cosine similarity to a query vector, in `[-1, 1]`.
///
/// Ephemeral — produced per query, never persisted.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub similarity: f32,
}

/// Result of one end-to-end `ask` call.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    /// Generated answer text, or the fixed no-match message when
    /// nothing passed the similarity threshold.
    pub answer: String,
    /// Deduplicated source identifiers of the chunks used.
    pub sources: Vec<String>,
    /// Number of retrieved chunks that fed the context.
    pub num_chunks: usize,
    /// Wall-clock seconds spent in the pipeline.
    pub execution_time: f64,
}

/// Row and source counts reported by a store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub chunks: i64,
    pub sources: i64,
}
