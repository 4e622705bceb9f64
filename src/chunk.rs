//! Token-window text chunker.
//!
//! Splits a document's token stream into fixed-size windows of
//! `chunk_size` tokens, each overlapping the previous by `overlap`
//! tokens. Windows carry provenance metadata (source, half-open token
//! range, sequence number). Pure function of its inputs: re-chunking
//! the same text with the same parameters yields identical boundaries.

use crate::error::{PipelineError, Result};
use crate::models::Chunk;
use crate::tokenizer::Tokenizer;

/// Split `text` into overlapping token windows.
///
/// Returns chunks with contiguous `chunk_id` values starting at 0.
/// Empty or whitespace-only input yields an empty list. A document
/// shorter than `chunk_size` yields exactly one chunk; the final chunk
/// may be shorter than `chunk_size`.
///
/// Fails with [`PipelineError::Configuration`] when
/// `overlap >= chunk_size`, since the step between windows would be
/// zero or negative and the loop would never terminate.
pub fn chunk_text(
    tokenizer: &dyn Tokenizer,
    text: &str,
    source: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    if chunk_size == 0 || overlap >= chunk_size {
        return Err(PipelineError::Configuration(format!(
            "overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let tokens = tokenizer.encode(text);
    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut chunk_id: i64 = 0;

    while start < tokens.len() {
        let end = (start + chunk_size).min(tokens.len());
        let window = &tokens[start..end];

        chunks.push(Chunk {
            content: tokenizer.decode(window),
            source: source.to_string(),
            chunk_id,
            start_token: start,
            end_token: end,
            token_count: end - start,
            embedding: None,
        });

        start += step;
        chunk_id += 1;
    }

    Ok(chunks)
}
