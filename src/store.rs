//! Storage abstraction for the retrieval pipeline.
//!
//! The [`VectorStore`] trait defines the contract the query pipeline
//! depends on, enabling pluggable backends: the SQLite store in
//! [`crate::db`] for production and [`MemoryStore`] for tests.
//!
//! # Retrieval contract
//!
//! `search` returns chunks ordered by similarity descending, at most
//! `k` of them, every one meeting the similarity threshold. Ties are
//! broken by insertion id ascending, so repeated calls over unchanged
//! data are deterministic. Zero matches is a normal outcome
//! (`Ok(vec![])`); transport failures surface as
//! [`PipelineError::Retrieval`](crate::error::PipelineError::Retrieval)
//! and are never mapped to an empty result.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::{PipelineError, Result};
use crate::models::{Chunk, RetrievedChunk, StoreStats};

/// Abstract chunk+vector storage backend.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Persist chunks with their embeddings. Every chunk must carry an
    /// embedding of the store's configured dimension; a missing or
    /// mismatched vector is a configuration error and nothing is
    /// written.
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()>;

    /// Nearest-neighbor search with a similarity floor.
    ///
    /// A `query_vec` whose length differs from the store dimension is
    /// rejected before any storage round trip.
    async fn search(
        &self,
        query_vec: &[f32],
        k: usize,
        similarity_threshold: f32,
    ) -> Result<Vec<RetrievedChunk>>;

    /// Row and distinct-source counts.
    async fn stats(&self) -> Result<StoreStats>;
}

/// Validate that every chunk carries an embedding of `dims` components.
pub(crate) fn check_embeddings(chunks: &[Chunk], dims: usize) -> Result<()> {
    for chunk in chunks {
        match &chunk.embedding {
            None => {
                return Err(PipelineError::Configuration(format!(
                    "chunk {}:{} has no embedding",
                    chunk.source, chunk.chunk_id
                )))
            }
            Some(v) if v.len() != dims => {
                return Err(PipelineError::Configuration(format!(
                    "embedding dimension mismatch for {}:{}: got {}, expected {}",
                    chunk.source,
                    chunk.chunk_id,
                    v.len(),
                    dims
                )))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

struct StoredRow {
    id: i64,
    chunk: Chunk,
}

/// In-memory [`VectorStore`] for testing.
///
/// Brute-force cosine similarity over all stored vectors, behind an
/// `RwLock`. Mirrors the retrieval contract of the SQLite store
/// exactly, including the insertion-id tie-break.
pub struct MemoryStore {
    dims: usize,
    rows: RwLock<Vec<StoredRow>>,
    next_id: RwLock<i64>,
}

impl MemoryStore {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            rows: RwLock::new(Vec::new()),
            next_id: RwLock::new(1),
        }
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        check_embeddings(chunks, self.dims)?;

        let mut rows = self.rows.write().unwrap();
        let mut next_id = self.next_id.write().unwrap();
        for chunk in chunks {
            rows.push(StoredRow {
                id: *next_id,
                chunk: chunk.clone(),
            });
            *next_id += 1;
        }
        Ok(())
    }

    async fn search(
        &self,
        query_vec: &[f32],
        k: usize,
        similarity_threshold: f32,
    ) -> Result<Vec<RetrievedChunk>> {
        if query_vec.len() != self.dims {
            return Err(PipelineError::Configuration(format!(
                "query vector dimension mismatch: got {}, expected {}",
                query_vec.len(),
                self.dims
            )));
        }

        let rows = self.rows.read().unwrap();
        let mut scored: Vec<(i64, RetrievedChunk)> = rows
            .iter()
            .filter_map(|row| {
                let vector = row.chunk.embedding.as_ref()?;
                let similarity = cosine_similarity(query_vec, vector);
                if similarity >= similarity_threshold {
                    Some((
                        row.id,
                        RetrievedChunk {
                            chunk: row.chunk.clone(),
                            similarity,
                        },
                    ))
                } else {
                    None
                }
            })
            .collect();

        // Similarity desc, insertion id asc for equal scores.
        scored.sort_by(|a, b| {
            b.1.similarity
                .partial_cmp(&a.1.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);

        Ok(scored.into_iter().map(|(_, rc)| rc).collect())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let rows = self.rows.read().unwrap();
        let mut sources: Vec<&str> = rows.iter().map(|r| r.chunk.source.as_str()).collect();
        sources.sort_unstable();
        sources.dedup();
        Ok(StoreStats {
            chunks: rows.len() as i64,
            sources: sources.len() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_with(source: &str, chunk_id: i64, embedding: Vec<f32>) -> Chunk {
        Chunk {
            content: format!("{} chunk {}", source, chunk_id),
            source: source.to_string(),
            chunk_id,
            start_token: 0,
            end_token: 4,
            token_count: 4,
            embedding: Some(embedding),
        }
    }

    #[tokio::test]
    async fn test_below_threshold_returns_empty_not_error() {
        let store = MemoryStore::new(2);
        store
            .insert_chunks(&[chunk_with("a.txt", 0, vec![0.0, 1.0])])
            .await
            .unwrap();

        // Query orthogonal to the stored vector: similarity 0 < 0.7.
        let results = store.search(&[1.0, 0.0], 5, 0.7).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_ordered_by_similarity_desc() {
        let store = MemoryStore::new(2);
        store
            .insert_chunks(&[
                chunk_with("a.txt", 0, vec![0.0, 1.0]),
                chunk_with("a.txt", 1, vec![1.0, 0.0]),
                chunk_with("a.txt", 2, vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0], 5, -1.0).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunk.chunk_id, 1);
        assert_eq!(results[1].chunk.chunk_id, 2);
        assert_eq!(results[2].chunk.chunk_id, 0);
        assert!(results[0].similarity >= results[1].similarity);
        assert!(results[1].similarity >= results[2].similarity);
    }

    #[tokio::test]
    async fn test_k_limits_result_count() {
        let store = MemoryStore::new(2);
        let chunks: Vec<Chunk> = (0..10)
            .map(|i| chunk_with("a.txt", i, vec![1.0, 0.0]))
            .collect();
        store.insert_chunks(&chunks).await.unwrap();

        let results = store.search(&[1.0, 0.0], 3, 0.5).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_tie_break_by_insertion_order_is_deterministic() {
        let store = MemoryStore::new(2);
        store
            .insert_chunks(&[
                chunk_with("b.txt", 0, vec![1.0, 0.0]),
                chunk_with("a.txt", 0, vec![1.0, 0.0]),
                chunk_with("c.txt", 0, vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let first = store.search(&[1.0, 0.0], 5, 0.0).await.unwrap();
        let second = store.search(&[1.0, 0.0], 5, 0.0).await.unwrap();

        let order: Vec<&str> = first.iter().map(|r| r.chunk.source.as_str()).collect();
        assert_eq!(order, vec!["b.txt", "a.txt", "c.txt"]);
        let order2: Vec<&str> = second.iter().map(|r| r.chunk.source.as_str()).collect();
        assert_eq!(order, order2);
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch_is_configuration_error() {
        let store = MemoryStore::new(3);
        let err = store.search(&[1.0, 0.0], 5, 0.0).await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_insert_rejects_missing_embedding() {
        let store = MemoryStore::new(2);
        let mut chunk = chunk_with("a.txt", 0, vec![1.0, 0.0]);
        chunk.embedding = None;
        let err = store.insert_chunks(&[chunk]).await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_stats_counts_rows_and_sources() {
        let store = MemoryStore::new(2);
        store
            .insert_chunks(&[
                chunk_with("a.txt", 0, vec![1.0, 0.0]),
                chunk_with("a.txt", 1, vec![0.0, 1.0]),
                chunk_with("b.txt", 0, vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.chunks, 3);
        assert_eq!(stats.sources, 2);
    }
}
