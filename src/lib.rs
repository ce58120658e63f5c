//! # docchat
//!
//! A retrieval-augmented document Q&A chatbot backend.
//!
//! docchat accepts PDF uploads, indexes their text into a vector index, and
//! answers chat questions by retrieving the most relevant passages and
//! handing them to a chat-completion model for answer synthesis.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────────┐   ┌─────────────┐
//! │ Documents │──▶│  Index Builder    │──▶│   SQLite     │
//! │  (PDFs)   │   │ Extract+Chunk     │   │ chunks+vecs │
//! └───────────┘   │      +Embed      │   └──────┬──────┘
//!                 └──────────────────┘          │
//!                                   ┌───────────┤
//!                                   ▼           ▼
//!                             ┌──────────┐ ┌──────────┐
//!                             │   CLI    │ │   HTTP   │
//!                             │(docchat) │ │  (axum)  │
//!                             └──────────┘ └──────────┘
//! ```
//!
//! Every upload triggers a full rebuild: the builder re-reads the whole
//! document store, stages a fresh index, and atomically swaps it into
//! place. The query engine is then reloaded wholesale.
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! docchat serve                      # start the HTTP backend
//! docchat build                      # rebuild the index by hand
//! docchat ask "How long do refunds take?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`store`] | Document store (uploaded PDFs on disk) |
//! | [`extract`] | PDF text extraction |
//! | [`chunk`] | Sliding-window text chunking |
//! | [`embedding`] | Embedding API client and vector utilities |
//! | [`llm`] | Chat-completion API client |
//! | [`index`] | Full index rebuild with atomic swap |
//! | [`engine`] | Query engine: retrieve and answer |
//! | [`server`] | HTTP API |
//! | [`db`] | Index database connection |

pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod engine;
pub mod extract;
pub mod index;
pub mod llm;
pub mod models;
pub mod server;
pub mod store;
