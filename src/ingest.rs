//! Document ingestion pipeline.
//!
//! Walks a directory of plain-text files, chunks each file into
//! overlapping token windows, embeds the chunks in order-preserving
//! batches, and inserts them into the store. A single unreadable file
//! is logged and skipped; chunks already extracted from good files are
//! never lost to one bad neighbor.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::chunk::chunk_text;
use crate::config::ChunkingConfig;
use crate::embedding::Embedder;
use crate::error::PipelineError;
use crate::models::Chunk;
use crate::store::VectorStore;
use crate::tokenizer::Tokenizer;

/// Counters for one ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
    pub files_found: usize,
    pub files_skipped: usize,
    pub chunks_created: usize,
    pub chunks_inserted: usize,
}

/// Ingest every `*.txt` file under `dir`.
///
/// With `dry_run` set, files are scanned and chunked but nothing is
/// embedded or written.
pub async fn ingest_directory(
    tokenizer: &dyn Tokenizer,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    dir: &Path,
    chunking: &ChunkingConfig,
    dry_run: bool,
) -> Result<IngestSummary> {
    if !dir.is_dir() {
        bail!("Documents directory not found: {}", dir.display());
    }

    let files = scan_text_files(dir)?;
    let mut summary = IngestSummary {
        files_found: files.len(),
        ..Default::default()
    };

    let mut all_chunks: Vec<Chunk> = Vec::new();

    for path in &files {
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => {
                // Partial-failure semantics: skip this file, keep the rest.
                let err = PipelineError::IngestionFile {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                };
                eprintln!("Warning: {}", err);
                summary.files_skipped += 1;
                continue;
            }
        };

        let chunks = chunk_text(
            tokenizer,
            &text,
            &source,
            chunking.chunk_size,
            chunking.overlap,
        )?;
        all_chunks.extend(chunks);
    }

    summary.chunks_created = all_chunks.len();

    if dry_run {
        println!("ingest {} (dry-run)", dir.display());
        println!("  files found: {}", summary.files_found);
        println!("  files skipped: {}", summary.files_skipped);
        println!("  estimated chunks: {}", summary.chunks_created);
        return Ok(summary);
    }

    if !all_chunks.is_empty() {
        let texts: Vec<String> = all_chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = embedder.embed(&texts).await?;

        for (chunk, vector) in all_chunks.iter_mut().zip(vectors.into_iter()) {
            chunk.embedding = Some(vector);
        }

        store.insert_chunks(&all_chunks).await?;
        summary.chunks_inserted = all_chunks.len();
    }

    println!("ingest {}", dir.display());
    println!("  files found: {}", summary.files_found);
    println!("  files skipped: {}", summary.files_skipped);
    println!("  chunks inserted: {}", summary.chunks_inserted);
    println!("ok");

    Ok(summary)
}

/// Collect `*.txt` files under `root`, sorted for deterministic
/// ingestion order.
fn scan_text_files(root: &Path) -> Result<Vec<PathBuf>> {
    let include = build_globset(&["**/*.txt".to_string()])?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if include.is_match(relative.to_string_lossy().as_ref()) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
