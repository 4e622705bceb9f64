//! SQLite-backed [`VectorStore`].
//!
//! Chunk rows live in a single `chunks` table with the embedding held
//! as a little-endian `f32` BLOB. Similarity search decodes the stored
//! vectors and ranks by cosine similarity in Rust; the index structure
//! of a dedicated vector engine is out of scope here.

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;

use crate::config::Config;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{PipelineError, Result};
use crate::models::{Chunk, RetrievedChunk, StoreStats};
use crate::store::{check_embeddings, VectorStore};

pub async fn connect(config: &Config) -> AnyResult<SqlitePool> {
    let db_path = &config.db.path;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// SQLite implementation of the retrieval contract.
pub struct SqliteStore {
    pool: SqlitePool,
    dims: usize,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, dims: usize) -> Self {
        Self { pool, dims }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        check_embeddings(chunks, self.dims)?;

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for chunk in chunks {
            let blob = chunk
                .embedding
                .as_ref()
                .map(|v| vec_to_blob(v))
                .unwrap_or_default();

            sqlx::query(
                r#"
                INSERT INTO chunks
                    (content, embedding, source, chunk_id, start_token, end_token, token_count, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.content)
            .bind(&blob)
            .bind(&chunk.source)
            .bind(chunk.chunk_id)
            .bind(chunk.start_token as i64)
            .bind(chunk.end_token as i64)
            .bind(chunk.token_count as i64)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn search(
        &self,
        query_vec: &[f32],
        k: usize,
        similarity_threshold: f32,
    ) -> Result<Vec<RetrievedChunk>> {
        // Reject before the storage round trip.
        if query_vec.len() != self.dims {
            return Err(PipelineError::Configuration(format!(
                "query vector dimension mismatch: got {}, expected {}",
                query_vec.len(),
                self.dims
            )));
        }

        let rows = sqlx::query(
            r#"
            SELECT id, content, embedding, source, chunk_id,
                   start_token, end_token, token_count
            FROM chunks
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<(i64, RetrievedChunk)> = Vec::new();

        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let vector = blob_to_vec(&blob);
            let similarity = cosine_similarity(query_vec, &vector);
            if similarity < similarity_threshold {
                continue;
            }

            let start_token: i64 = row.get("start_token");
            let end_token: i64 = row.get("end_token");
            let token_count: i64 = row.get("token_count");

            scored.push((
                row.get("id"),
                RetrievedChunk {
                    chunk: Chunk {
                        content: row.get("content"),
                        source: row.get("source"),
                        chunk_id: row.get("chunk_id"),
                        start_token: start_token as usize,
                        end_token: end_token as usize,
                        token_count: token_count as usize,
                        embedding: Some(vector),
                    },
                    similarity,
                },
            ));
        }

        // Similarity desc; rowid asc keeps equal scores deterministic.
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
        let row = sqlx::query(
            "SELECT COUNT(*) AS chunks, COUNT(DISTINCT source) AS sources FROM chunks",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StoreStats {
            chunks: row.get("chunks"),
            sources: row.get("sources"),
        })
    }
}
