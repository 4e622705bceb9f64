use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub context: ContextConfig,
    pub inference: InferenceConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Target tokens per chunk.
    pub chunk_size: usize,
    /// Overlapping tokens between consecutive chunks. Must be < chunk_size.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

fn default_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// When true and a search matches nothing, log the top near-miss
    /// similarities to stderr. Diagnostic only; never changes results.
    #[serde(default)]
    pub diagnose_misses: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
            diagnose_misses: false,
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_similarity_threshold() -> f32 {
    0.7
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContextConfig {
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
    #[serde(default = "default_system_prompt_reserve")]
    pub system_prompt_reserve: usize,
    #[serde(default = "default_answer_reserve")]
    pub answer_reserve: usize,
    /// Floor for the usable context budget after reserves are deducted.
    #[serde(default = "default_min_context_tokens")]
    pub min_context_tokens: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: default_max_context_tokens(),
            system_prompt_reserve: default_system_prompt_reserve(),
            answer_reserve: default_answer_reserve(),
            min_context_tokens: default_min_context_tokens(),
        }
    }
}

fn default_max_context_tokens() -> usize {
    2000
}
fn default_system_prompt_reserve() -> usize {
    150
}
fn default_answer_reserve() -> usize {
    500
}
fn default_min_context_tokens() -> usize {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct InferenceConfig {
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    pub embedding_dims: usize,
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_embedding_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}
fn default_generation_model() -> String {
    "mistralai/Mistral-7B-Instruct-v0.2".to_string()
}
fn default_max_new_tokens() -> u32 {
    512
}
fn default_temperature() -> f32 {
    0.7
}
fn default_batch_size() -> usize {
    32
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7700".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking. A step of chunk_size - overlap <= 0 would loop
    // forever, so this must fail before any processing.
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.overlap,
            config.chunking.chunk_size
        );
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if !(-1.0..=1.0).contains(&config.retrieval.similarity_threshold) {
        anyhow::bail!("retrieval.similarity_threshold must be in [-1.0, 1.0]");
    }

    // Validate context budget
    if config.context.max_context_tokens == 0 {
        anyhow::bail!("context.max_context_tokens must be > 0");
    }
    if config.context.min_context_tokens == 0 {
        anyhow::bail!("context.min_context_tokens must be > 0");
    }

    // Validate inference
    if config.inference.embedding_dims == 0 {
        anyhow::bail!("inference.embedding_dims must be > 0");
    }
    if config.inference.batch_size == 0 {
        anyhow::bail!("inference.batch_size must be > 0");
    }
    if config.inference.temperature < 0.0 {
        anyhow::bail!("inference.temperature must be >= 0.0");
    }

    Ok(config)
}
