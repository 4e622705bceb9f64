//! End-to-end pipeline tests over the in-memory store with fake
//! inference collaborators.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use docqa::config::ChunkingConfig;
use docqa::context::ContextBudget;
use docqa::embedding::Embedder;
use docqa::error::{PipelineError, Result};
use docqa::generation::Generator;
use docqa::ingest::ingest_directory;
use docqa::models::Chunk;
use docqa::query::{QaPipeline, QaSettings, NO_MATCH_ANSWER};
use docqa::store::{MemoryStore, VectorStore};
use docqa::tokenizer::ByteTokenizer;

const DIMS: usize = 3;

/// Deterministic embedder: looks texts up in a fixed table, falling
/// back to a constant vector for anything unlisted.
struct FakeEmbedder {
    table: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
}

impl FakeEmbedder {
    fn new(entries: &[(&str, [f32; DIMS])]) -> Self {
        Self {
            table: entries
                .iter()
                .map(|(text, v)| (text.to_string(), v.to_vec()))
                .collect(),
            fallback: vec![0.0, 0.0, 1.0],
        }
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| self.table.get(t).cloned().unwrap_or_else(|| self.fallback.clone()))
            .collect())
    }

    fn dims(&self) -> usize {
        DIMS
    }
}

/// Embedder that always fails, for error propagation tests.
struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(PipelineError::Embedding("service unavailable".to_string()))
    }

    fn dims(&self) -> usize {
        DIMS
    }
}

/// Generator that records the prompt it received and returns a canned
/// answer.
struct RecordingGenerator {
    answer: String,
    last_prompt: Mutex<Option<String>>,
}

impl RecordingGenerator {
    fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            last_prompt: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(&self, prompt: &str, _max_new_tokens: u32, _temperature: f32) -> Result<String> {
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        Ok(self.answer.clone())
    }
}

/// Generator that always fails, for error propagation tests.
struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    async fn generate(&self, _prompt: &str, _max_new_tokens: u32, _temperature: f32) -> Result<String> {
        Err(PipelineError::Generation("model overloaded".to_string()))
    }
}

fn chunk(content: &str, source: &str, chunk_id: i64, embedding: [f32; DIMS]) -> Chunk {
    let token_count = content.len();
    Chunk {
        content: content.to_string(),
        source: source.to_string(),
        chunk_id,
        start_token: 0,
        end_token: token_count,
        token_count,
        embedding: Some(embedding.to_vec()),
    }
}

fn settings(threshold: f32) -> QaSettings {
    QaSettings {
        top_k: 5,
        similarity_threshold: threshold,
        diagnose_misses: false,
        budget: ContextBudget {
            max_context_tokens: 2000,
            system_prompt_reserve: 150,
            answer_reserve: 500,
            min_context_tokens: 500,
        },
        max_new_tokens: 64,
        temperature: 0.2,
    }
}

fn pipeline(
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    store: Arc<dyn VectorStore>,
    threshold: f32,
) -> QaPipeline {
    QaPipeline::new(
        Arc::new(ByteTokenizer),
        embedder,
        generator,
        store,
        settings(threshold),
    )
}

#[tokio::test]
async fn test_ask_end_to_end() {
    let store = Arc::new(MemoryStore::new(DIMS));
    store
        .insert_chunks(&[
            chunk("Rust has ownership.", "langs.txt", 0, [1.0, 0.0, 0.0]),
            chunk("Python has a GIL.", "langs.txt", 1, [0.0, 1.0, 0.0]),
            chunk("Rust compiles to native code.", "notes.txt", 0, [0.9, 0.1, 0.0]),
        ])
        .await
        .unwrap();

    let embedder = Arc::new(FakeEmbedder::new(&[(
        "Tell me about Rust",
        [1.0, 0.0, 0.0],
    )]));
    let generator = Arc::new(RecordingGenerator::new("Rust is a systems language."));
    let qa = pipeline(embedder, generator.clone(), store, 0.5);

    let outcome = qa.ask("Tell me about Rust").await.unwrap();

    assert_eq!(outcome.answer, "Rust is a systems language.");
    assert_eq!(outcome.num_chunks, 2);
    // Sources deduplicated, in rank order of first appearance.
    assert_eq!(outcome.sources, vec!["langs.txt", "notes.txt"]);
    assert!(outcome.execution_time >= 0.0);

    let prompt = generator.last_prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.contains("Tell me about Rust"));
    assert!(prompt.contains("Rust has ownership."));
    assert!(prompt.contains("Rust compiles to native code."));
    // The below-threshold chunk never reaches the model.
    assert!(!prompt.contains("Python has a GIL."));
}

#[tokio::test]
async fn test_ask_no_match_returns_fixed_answer() {
    let store = Arc::new(MemoryStore::new(DIMS));
    store
        .insert_chunks(&[chunk("Unrelated text.", "misc.txt", 0, [0.0, 1.0, 0.0])])
        .await
        .unwrap();

    let embedder = Arc::new(FakeEmbedder::new(&[("orthogonal", [1.0, 0.0, 0.0])]));
    let generator = Arc::new(RecordingGenerator::new("should never be called"));
    let qa = pipeline(embedder, generator.clone(), store, 0.7);

    let outcome = qa.ask("orthogonal").await.unwrap();

    assert_eq!(outcome.answer, NO_MATCH_ANSWER);
    assert_eq!(outcome.num_chunks, 0);
    assert!(outcome.sources.is_empty());
    // No retrieval match means no generation call.
    assert!(generator.last_prompt.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_ask_empty_store_no_match() {
    let store = Arc::new(MemoryStore::new(DIMS));
    let embedder = Arc::new(FakeEmbedder::new(&[]));
    let generator = Arc::new(RecordingGenerator::new("unused"));
    let qa = pipeline(embedder, generator, store, 0.7);

    let outcome = qa.ask("anything at all").await.unwrap();
    assert_eq!(outcome.answer, NO_MATCH_ANSWER);
    assert_eq!(outcome.num_chunks, 0);
}

#[tokio::test]
async fn test_embedding_failure_propagates() {
    let store = Arc::new(MemoryStore::new(DIMS));
    let generator = Arc::new(RecordingGenerator::new("unused"));
    let qa = pipeline(Arc::new(FailingEmbedder), generator, store, 0.7);

    let err = qa.ask("any question").await.unwrap_err();
    assert!(matches!(err, PipelineError::Embedding(_)));
}

#[tokio::test]
async fn test_generation_failure_propagates() {
    let store = Arc::new(MemoryStore::new(DIMS));
    store
        .insert_chunks(&[chunk("Some stored fact.", "facts.txt", 0, [1.0, 0.0, 0.0])])
        .await
        .unwrap();

    let embedder = Arc::new(FakeEmbedder::new(&[("question", [1.0, 0.0, 0.0])]));
    let qa = pipeline(embedder, Arc::new(FailingGenerator), store, 0.5);

    let err = qa.ask("question").await.unwrap_err();
    assert!(matches!(err, PipelineError::Generation(_)));
}

#[tokio::test]
async fn test_ingest_directory_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("alpha.txt"), "alpha document body").unwrap();
    std::fs::write(dir.path().join("beta.txt"), "beta document body").unwrap();
    std::fs::write(dir.path().join("ignored.md"), "not a txt file").unwrap();

    let tokenizer = ByteTokenizer;
    let embedder = FakeEmbedder::new(&[]);
    let store = MemoryStore::new(DIMS);
    let chunking = ChunkingConfig {
        chunk_size: 512,
        overlap: 50,
    };

    let summary = ingest_directory(&tokenizer, &embedder, &store, dir.path(), &chunking, false)
        .await
        .unwrap();

    assert_eq!(summary.files_found, 2);
    assert_eq!(summary.files_skipped, 0);
    assert_eq!(summary.chunks_created, 2);
    assert_eq!(summary.chunks_inserted, 2);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.chunks, 2);
    assert_eq!(stats.sources, 2);
}

#[tokio::test]
async fn test_ingest_skips_unreadable_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("good.txt"), "readable content").unwrap();
    // Invalid UTF-8 makes read_to_string fail for this file only.
    std::fs::write(dir.path().join("bad.txt"), [0xffu8, 0xfe, 0xfd]).unwrap();

    let tokenizer = ByteTokenizer;
    let embedder = FakeEmbedder::new(&[]);
    let store = MemoryStore::new(DIMS);
    let chunking = ChunkingConfig {
        chunk_size: 512,
        overlap: 50,
    };

    let summary = ingest_directory(&tokenizer, &embedder, &store, dir.path(), &chunking, false)
        .await
        .unwrap();

    assert_eq!(summary.files_found, 2);
    assert_eq!(summary.files_skipped, 1);
    assert_eq!(summary.chunks_inserted, 1);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.chunks, 1);
}

#[tokio::test]
async fn test_ingest_dry_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("doc.txt"), "some content to chunk").unwrap();

    let tokenizer = ByteTokenizer;
    // A failing embedder proves dry runs never embed.
    let embedder = FailingEmbedder;
    let store = MemoryStore::new(DIMS);
    let chunking = ChunkingConfig {
        chunk_size: 512,
        overlap: 50,
    };

    let summary = ingest_directory(&tokenizer, &embedder, &store, dir.path(), &chunking, true)
        .await
        .unwrap();

    assert_eq!(summary.files_found, 1);
    assert_eq!(summary.chunks_created, 1);
    assert_eq!(summary.chunks_inserted, 0);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.chunks, 0);
}

#[tokio::test]
async fn test_ingest_missing_directory_fails() {
    let tokenizer = ByteTokenizer;
    let embedder = FakeEmbedder::new(&[]);
    let store = MemoryStore::new(DIMS);
    let chunking = ChunkingConfig {
        chunk_size: 512,
        overlap: 50,
    };

    let result = ingest_directory(
        &tokenizer,
        &embedder,
        &store,
        std::path::Path::new("/definitely/not/a/dir"),
        &chunking,
        false,
    )
    .await;
    assert!(result.is_err());
}
