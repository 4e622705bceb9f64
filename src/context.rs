//! Token-budgeted context assembly.
//!
//! Takes similarity-ranked retrieved chunks and packs as many as fit
//! into the token budget left after reserving room for the question,
//! the system prompt, and the model's answer. Greedy and
//! order-preserving by design: the walk stops at the first chunk that
//! would overflow, even if a later chunk would individually fit.
//!
//! Pure function of its inputs; no I/O.

use crate::config::ContextConfig;
use crate::models::RetrievedChunk;
use crate::tokenizer::Tokenizer;

/// Separator between formatted chunk blocks.
const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Marker appended to a chunk that had to be cut to fit the budget.
const TRUNCATION_MARKER: &str = "...";

/// Token budget parameters for one assembly.
#[derive(Debug, Clone)]
pub struct ContextBudget {
    /// Total token allotment for the assembled prompt context.
    pub max_context_tokens: usize,
    /// Tokens reserved for the system prompt.
    pub system_prompt_reserve: usize,
    /// Tokens reserved for the generated answer.
    pub answer_reserve: usize,
    /// Floor on the usable budget, guaranteeing a minimum context even
    /// when the reserves would otherwise swallow it.
    pub min_context_tokens: usize,
}

impl From<&ContextConfig> for ContextBudget {
    fn from(c: &ContextConfig) -> Self {
        Self {
            max_context_tokens: c.max_context_tokens,
            system_prompt_reserve: c.system_prompt_reserve,
            answer_reserve: c.answer_reserve,
            min_context_tokens: c.min_context_tokens,
        }
    }
}

impl ContextBudget {
    /// Tokens available for chunk content after reserving space for
    /// the question and the fixed reserves, floored at
    /// `min_context_tokens`.
    fn available(&self, tokenizer: &dyn Tokenizer, question: &str) -> usize {
        let reserved =
            tokenizer.count(question) + self.system_prompt_reserve + self.answer_reserve;
        self.max_context_tokens
            .saturating_sub(reserved)
            .max(self.min_context_tokens)
    }
}

/// Assemble ranked chunks into a context string within the budget.
///
/// Chunks are walked in the order given (already similarity-ranked)
/// and accumulated while they fit. If the very first chunk alone
/// exceeds the budget it is still included, truncated at token level
/// with [`TRUNCATION_MARKER`] appended — the assembler never returns
/// an empty context when at least one candidate exists.
pub fn assemble(
    tokenizer: &dyn Tokenizer,
    chunks: &[RetrievedChunk],
    question: &str,
    budget: &ContextBudget,
) -> String {
    if chunks.is_empty() {
        return String::new();
    }

    let available = budget.available(tokenizer, question);
    let mut parts: Vec<String> = Vec::new();
    let mut used_tokens = 0usize;

    for retrieved in chunks {
        let token_count = retrieved.chunk.token_count;

        if used_tokens + token_count > available {
            if parts.is_empty() {
                // First-chunk guarantee: include it truncated to fit.
                let content = truncate(tokenizer, &retrieved.chunk.content, available);
                parts.push(format_block(retrieved, &content));
            }
            break;
        }

        parts.push(format_block(retrieved, &retrieved.chunk.content));
        used_tokens += token_count;
    }

    parts.join(BLOCK_SEPARATOR)
}

/// Format one chunk with its provenance header.
///
/// The similarity segment is omitted when the score carries no meaning
/// (zero or negative, e.g. ingestion-time formatting).
fn format_block(retrieved: &RetrievedChunk, content: &str) -> String {
    let chunk = &retrieved.chunk;
    let mut header = format!("[{} | Chunk {}", chunk.source, chunk.chunk_id);
    if retrieved.similarity > 0.0 {
        header.push_str(&format!(" | Similarity {:.3}", retrieved.similarity));
    }
    header.push(']');
    format!("{}\n{}", header, content)
}

/// Truncate `text` so that the result, marker included, never exceeds
/// `max_tokens`. The marker's own token cost is reserved before
/// cutting the content; when even the marker cannot fit, the content
/// is cut to `max_tokens` and the marker is dropped.
fn truncate(tokenizer: &dyn Tokenizer, text: &str, max_tokens: usize) -> String {
    let ids = tokenizer.encode(text);
    if ids.len() <= max_tokens {
        return text.to_string();
    }

    let marker_cost = tokenizer.count(TRUNCATION_MARKER);
    if max_tokens > marker_cost {
        let kept = tokenizer.decode(&ids[..max_tokens - marker_cost]);
        format!("{}{}", kept, TRUNCATION_MARKER)
    } else {
        tokenizer.decode(&ids[..max_tokens])
    }
}
