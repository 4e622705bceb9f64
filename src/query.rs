//! End-to-end question answering pipeline.
//!
//! [`QaPipeline`] wires the four collaborators together: embed the
//! question, search the store, assemble a token-budgeted context, and
//! generate an answer. All collaborators are passed in at construction
//! so tests can substitute fakes for the embedding service, the
//! generation service, and the store.
//!
//! A query is processed start to finish before the next begins in a
//! given execution context; the pipeline holds no mutable state of its
//! own, so concurrent callers share nothing but the store.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::context::{assemble, ContextBudget};
use crate::embedding::{embed_query, Embedder};
use crate::error::Result;
use crate::generation::{build_prompt, Generator};
use crate::models::QueryOutcome;
use crate::store::VectorStore;
use crate::tokenizer::Tokenizer;

/// Answer returned when nothing in the store passes the similarity
/// threshold. A normal outcome, not a failure.
pub const NO_MATCH_ANSWER: &str =
    "I couldn't find relevant information to answer your question.";

/// Tunables for one pipeline instance, extracted from the config.
#[derive(Debug, Clone)]
pub struct QaSettings {
    pub top_k: usize,
    pub similarity_threshold: f32,
    pub diagnose_misses: bool,
    pub budget: ContextBudget,
    pub max_new_tokens: u32,
    pub temperature: f32,
}

impl From<&Config> for QaSettings {
    fn from(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            similarity_threshold: config.retrieval.similarity_threshold,
            diagnose_misses: config.retrieval.diagnose_misses,
            budget: ContextBudget::from(&config.context),
            max_new_tokens: config.inference.max_new_tokens,
            temperature: config.inference.temperature,
        }
    }
}

/// The retrieval-augmented QA pipeline with injected collaborators.
pub struct QaPipeline {
    tokenizer: Arc<dyn Tokenizer>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    store: Arc<dyn VectorStore>,
    settings: QaSettings,
}

impl QaPipeline {
    pub fn new(
        tokenizer: Arc<dyn Tokenizer>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        store: Arc<dyn VectorStore>,
        settings: QaSettings,
    ) -> Self {
        Self {
            tokenizer,
            embedder,
            generator,
            store,
            settings,
        }
    }

    /// Answer a free-text question from the stored documents.
    ///
    /// Zero chunks above the threshold yields the fixed
    /// [`NO_MATCH_ANSWER`] with `num_chunks = 0`. Any collaborator
    /// failure propagates; no partial or fabricated answers.
    pub async fn ask(&self, question: &str) -> Result<QueryOutcome> {
        let started = Instant::now();

        let query_vec = embed_query(self.embedder.as_ref(), question).await?;

        let retrieved = self
            .store
            .search(
                &query_vec,
                self.settings.top_k,
                self.settings.similarity_threshold,
            )
            .await?;

        if retrieved.is_empty() {
            if self.settings.diagnose_misses {
                self.log_near_misses(&query_vec).await;
            }
            return Ok(QueryOutcome {
                answer: NO_MATCH_ANSWER.to_string(),
                sources: Vec::new(),
                num_chunks: 0,
                execution_time: started.elapsed().as_secs_f64(),
            });
        }

        let context = assemble(
            self.tokenizer.as_ref(),
            &retrieved,
            question,
            &self.settings.budget,
        );
        let prompt = build_prompt(question, &context);

        let answer = self
            .generator
            .generate(
                &prompt,
                self.settings.max_new_tokens,
                self.settings.temperature,
            )
            .await?;

        let mut sources: Vec<String> = Vec::new();
        for rc in &retrieved {
            if !sources.contains(&rc.chunk.source) {
                sources.push(rc.chunk.source.clone());
            }
        }

        Ok(QueryOutcome {
            answer,
            sources,
            num_chunks: retrieved.len(),
            execution_time: started.elapsed().as_secs_f64(),
        })
    }

    /// Diagnostic hook: when a search matched nothing, log the best
    /// near misses so a misconfigured threshold is easy to spot.
    /// Never changes the query outcome.
    async fn log_near_misses(&self, query_vec: &[f32]) {
        match self.store.search(query_vec, 3, -1.0).await {
            Ok(top) if !top.is_empty() => {
                eprintln!("No chunks passed the similarity threshold. Closest matches:");
                for rc in top {
                    eprintln!(
                        "  {} (chunk {}): similarity {:.3}",
                        rc.chunk.source, rc.chunk.chunk_id, rc.similarity
                    );
                }
            }
            Ok(_) => eprintln!("No chunks passed the similarity threshold; store is empty."),
            Err(e) => eprintln!("Warning: near-miss diagnostic failed: {}", e),
        }
    }
}
