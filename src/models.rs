//! Core data models used throughout docchat.
//!
//! These types represent the documents, chunks, and retrieval results that
//! flow through the ingestion and question-answering pipeline.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// A raw PDF sitting in the document store.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    /// Sanitized filename, unique within the store.
    pub filename: String,
    /// Absolute or store-relative path on disk.
    pub path: PathBuf,
    /// Upload time, taken from the file's modification timestamp.
    pub uploaded_at: DateTime<Utc>,
    pub size_bytes: u64,
}

/// A bounded span of extracted document text: the unit of embedding
/// and retrieval.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    /// Filename of the source document in the store.
    pub filename: String,
    /// Position within the source document, contiguous from 0.
    pub chunk_index: i64,
    pub text: String,
    /// SHA-256 of `text`.
    pub hash: String,
}

/// A chunk returned from similarity search, with its cosine score.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub filename: String,
    pub chunk_index: i64,
    pub text: String,
    pub score: f32,
}

/// A generated answer plus the chunks that grounded it.
///
/// HTTP callers receive only `reply`; the retrieval detail is kept on the
/// engine contract so the CLI (and future citation support) can use it.
#[derive(Debug, Clone)]
pub struct Answer {
    pub reply: String,
    pub sources: Vec<RetrievedChunk>,
}
