//! # docchat CLI
//!
//! The `docchat` binary runs the Q&A backend and its supporting tasks.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat serve` | Start the HTTP backend (upload + chat API) |
//! | `docchat build` | Rebuild the vector index from the document store |
//! | `docchat ask "<question>"` | Answer a question from the terminal |
//!
//! All commands accept a `--config` flag pointing to a TOML configuration
//! file; when the file does not exist, built-in defaults apply
//! (`./documents`, `./index`, bind `127.0.0.1:5000`).
//!
//! `OPENAI_API_KEY` must be set in the environment; every command fails at
//! startup without it.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use docchat::config;
use docchat::embedding::EmbeddingClient;
use docchat::engine::QueryEngine;
use docchat::index::{self, BuildOutcome};
use docchat::llm::ChatClient;
use docchat::server;

/// docchat, a retrieval-augmented document Q&A chatbot backend.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "A retrieval-augmented document Q&A chatbot backend",
    version,
    long_about = "docchat accepts PDF uploads, indexes their text into a vector index, and \
    answers chat questions by retrieving the most relevant passages and handing them to a \
    chat-completion model."
)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply if absent.
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP backend.
    ///
    /// Serves `GET /`, `POST /api/upload`, and `POST /api/chat` on the
    /// configured bind address. An existing index is loaded at startup;
    /// otherwise the engine initializes lazily after the first upload.
    Serve,

    /// Rebuild the vector index from the document store.
    ///
    /// Reads every PDF under the configured documents directory, re-embeds
    /// all chunks, and atomically replaces the persisted index. The same
    /// rebuild runs automatically on every upload.
    Build,

    /// Ask a single question against the current index.
    ///
    /// Prints the generated answer followed by the source chunks it was
    /// grounded on.
    Ask {
        /// The question to answer.
        question: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Build => {
            let embedder = EmbeddingClient::from_config(&cfg.embedding)?;
            match index::build_index(&cfg, &embedder).await? {
                BuildOutcome::Built { documents, chunks } => {
                    println!("build");
                    println!("  documents: {}", documents);
                    println!("  chunks: {}", chunks);
                    println!("ok");
                }
                BuildOutcome::NoDocuments | BuildOutcome::NoText { .. } => {
                    // build_index already reported the condition
                }
            }
        }
        Commands::Ask { question } => {
            let embedder = Arc::new(EmbeddingClient::from_config(&cfg.embedding)?);
            let chat = Arc::new(ChatClient::from_config(&cfg.llm)?);

            let engine = QueryEngine::load(&cfg, embedder, chat)
                .await?
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "No index found at {}. Add PDFs to {} and run `docchat build` first.",
                        cfg.index_path().display(),
                        cfg.store.documents_dir.display()
                    )
                })?;

            let answer = engine.answer(&question).await?;

            println!("{}", answer.reply);
            println!();
            for (i, source) in answer.sources.iter().enumerate() {
                let excerpt: String = source.text.chars().take(120).collect();
                println!(
                    "{}. [{:.2}] {} #{}",
                    i + 1,
                    source.score,
                    source.filename,
                    source.chunk_index
                );
                println!("    excerpt: \"{}\"", excerpt.replace('\n', " "));
            }
        }
    }

    Ok(())
}
