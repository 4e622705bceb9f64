//! # docqa
//!
//! A retrieval-augmented question answering pipeline for local documents.
//!
//! Plain-text documents are split into overlapping token windows,
//! embedded into vectors, and stored in SQLite. Questions are embedded
//! the same way, matched against the stored chunks by cosine
//! similarity, assembled into a token-budgeted context, and answered by
//! a hosted generative model.
//!
//! ## Architecture
//!
//! ```text
//! ingestion:  documents ──▶ chunker ──▶ embedder ──▶ store
//! query:      question ──▶ embedder ──▶ store.search ──▶ assembler ──▶ generator ──▶ answer
//! ```
//!
//! Data flows one way on each path; no component call cycles. The
//! embedding endpoint, the generation endpoint, and the store are
//! black-box collaborators behind traits, injected into
//! [`query::QaPipeline`] so tests can substitute fakes.
//!
//! ## Quick Start
//!
//! ```bash
//! docqa init                    # create the database
//! docqa ingest ./documents      # chunk + embed + store *.txt files
//! docqa ask "What does the CV say about Rust?"
//! docqa serve                   # JSON API: POST /ask, GET /health
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | Pipeline error taxonomy |
//! | [`models`] | Core data types |
//! | [`tokenizer`] | Tokenizer adapter (text ↔ token ids) |
//! | [`chunk`] | Overlapping token-window chunker |
//! | [`embedding`] | Embedding gateway with batching and retry |
//! | [`store`] | Storage abstraction and in-memory store |
//! | [`db`] | SQLite-backed store |
//! | [`migrate`] | Schema creation |
//! | [`context`] | Token-budgeted context assembly |
//! | [`generation`] | Prompt builder and answer gateway |
//! | [`ingest`] | Directory ingestion |
//! | [`query`] | End-to-end QA pipeline |
//! | [`server`] | HTTP query boundary |

pub mod chunk;
pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod query;
pub mod server;
pub mod store;
pub mod tokenizer;
