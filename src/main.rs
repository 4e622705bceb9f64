//! # docqa CLI
//!
//! The `docqa` binary is the primary interface for the document QA
//! pipeline. It provides commands for database initialization, document
//! ingestion, question answering, and starting the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa init` | Create the SQLite database and run schema migrations |
//! | `docqa ingest <dir>` | Chunk, embed, and store `*.txt` documents |
//! | `docqa ask "<question>"` | Answer a question from the stored documents |
//! | `docqa stats` | Show chunk and source counts |
//! | `docqa serve` | Start the JSON HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! docqa init --config ./config/docqa.toml
//!
//! # Ingest a directory of plain-text documents
//! docqa ingest ./documents --config ./config/docqa.toml
//!
//! # See what would be ingested without writing anything
//! docqa ingest ./documents --dry-run
//!
//! # Ask a question
//! docqa ask "What experience does the CV list with Rust?"
//!
//! # Start the HTTP server (POST /ask, GET /health)
//! docqa serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use docqa::config::{self, Config};
use docqa::db::{self, SqliteStore};
use docqa::embedding::{DisabledEmbedder, Embedder, HfEmbedder};
use docqa::generation::HfGenerator;
use docqa::ingest;
use docqa::migrate;
use docqa::query::{QaPipeline, QaSettings};
use docqa::server;
use docqa::store::VectorStore;
use docqa::tokenizer;

/// docqa CLI — retrieval-augmented question answering over local
/// plain-text documents.
///
/// All commands accept a `--config` flag pointing to a TOML
/// configuration file. See `config/docqa.example.toml` for a full
/// example.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "docqa — retrieval-augmented question answering over local documents",
    version,
    long_about = "docqa splits plain-text documents into overlapping token windows, embeds them \
    via the Hugging Face Inference API, stores the vectors in SQLite, and answers questions by \
    retrieving the most similar chunks and prompting a hosted generative model with them."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docqa.toml`. All database, chunking,
    /// retrieval, inference, and server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the chunks table. This
    /// command is idempotent — running it multiple times is safe.
    Init,

    /// Ingest a directory of plain-text documents.
    ///
    /// Scans `<dir>` recursively for `*.txt` files, splits each into
    /// overlapping token windows, embeds the chunks, and stores them.
    /// Unreadable files are skipped with a warning; the rest of the run
    /// proceeds.
    Ingest {
        /// Directory containing `*.txt` documents.
        dir: PathBuf,

        /// Dry run — show file and chunk counts without embedding or
        /// writing to the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// Answer a question from the stored documents.
    ///
    /// Embeds the question, retrieves the most similar chunks above the
    /// configured similarity threshold, and prompts the generation
    /// model with them. Prints the answer, the sources used, and
    /// timing.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Show store statistics.
    ///
    /// Prints the number of stored chunks and distinct sources.
    Stats,

    /// Start the HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and exposes
    /// `POST /ask` and `GET /health` as a JSON API.
    Serve,
}

/// Open the SQLite-backed store from config.
async fn open_store(cfg: &Config) -> anyhow::Result<Arc<SqliteStore>> {
    let pool = db::connect(cfg).await?;
    Ok(Arc::new(SqliteStore::new(
        pool,
        cfg.inference.embedding_dims,
    )))
}

/// Assemble the full QA pipeline: tokenizer, embedder, generator, store.
async fn build_pipeline(cfg: &Config) -> anyhow::Result<Arc<QaPipeline>> {
    let tokenizer: Arc<dyn tokenizer::Tokenizer> =
        Arc::from(tokenizer::load(&cfg.inference.embedding_model).await);
    let embedder = Arc::new(HfEmbedder::new(&cfg.inference)?);
    let generator = Arc::new(HfGenerator::new(&cfg.inference)?);
    let store = open_store(cfg).await?;

    Ok(Arc::new(QaPipeline::new(
        tokenizer,
        embedder,
        generator,
        store,
        QaSettings::from(cfg),
    )))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { dir, dry_run } => {
            let tokenizer = tokenizer::load(&cfg.inference.embedding_model).await;
            // Dry runs never embed, so no token or provider is needed.
            let embedder: Box<dyn Embedder> = if dry_run {
                Box::new(DisabledEmbedder)
            } else {
                Box::new(HfEmbedder::new(&cfg.inference)?)
            };
            let store = open_store(&cfg).await?;

            ingest::ingest_directory(
                tokenizer.as_ref(),
                embedder.as_ref(),
                store.as_ref(),
                &dir,
                &cfg.chunking,
                dry_run,
            )
            .await?;
        }
        Commands::Ask { question } => {
            let pipeline = build_pipeline(&cfg).await?;
            let outcome = pipeline.ask(&question).await?;

            println!("{}", outcome.answer);
            println!();
            if outcome.sources.is_empty() {
                println!("  sources: (none)");
            } else {
                println!("  sources: {}", outcome.sources.join(", "));
            }
            println!("  chunks:  {}", outcome.num_chunks);
            println!("  time:    {:.2}s", outcome.execution_time);
        }
        Commands::Stats => {
            let store = open_store(&cfg).await?;
            let stats = store.stats().await?;

            println!("Store statistics");
            println!("  chunks:  {}", stats.chunks);
            println!("  sources: {}", stats.sources);
        }
        Commands::Serve => {
            let pipeline = build_pipeline(&cfg).await?;
            server::run_server(&cfg, pipeline).await?;
        }
    }

    Ok(())
}
