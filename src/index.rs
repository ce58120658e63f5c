//! Index builder.
//!
//! Rebuilds the persisted vector index from the full contents of the
//! document store: every PDF is extracted, chunked, and embedded on every
//! build; there is no incremental path. The result is a single SQLite file
//! holding documents, chunks, vectors, and build metadata.
//!
//! Builds are staged: everything is written into `index.sqlite.tmp` and
//! renamed over `index.sqlite` only once the build has fully succeeded, so
//! a failure (embedding outage, crash, bad PDF) leaves the prior index
//! intact and loadable.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::path::Path;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::db;
use crate::embedding::{vec_to_blob, EmbeddingClient};
use crate::extract;
use crate::models::{Chunk, StoredDocument};
use crate::store;

pub const META_EMBEDDING_MODEL: &str = "embedding_model";
pub const META_EMBEDDING_DIMS: &str = "embedding_dims";
pub const META_BUILT_AT: &str = "built_at";
pub const META_SCHEMA_VERSION: &str = "schema_version";

const SCHEMA_VERSION: &str = "1";

/// Result of a build attempt. The two skip variants are normal conditions,
/// not errors: the index on disk is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Document store empty or absent.
    NoDocuments,
    /// Files present but extraction produced no chunks.
    NoText { documents: usize },
    Built { documents: usize, chunks: usize },
}

/// Rebuild the index from the document store.
///
/// Reads every PDF, extracts and sanitizes its text, chunks it, embeds all
/// chunks in batches, and swaps the staged database into place. Any failure
/// propagates without touching the previously committed index.
pub async fn build_index(config: &Config, embedder: &EmbeddingClient) -> Result<BuildOutcome> {
    let documents = store::scan_documents(config)?;
    if documents.is_empty() {
        println!(
            "Document store '{}' is empty. No index will be built.",
            config.store.documents_dir.display()
        );
        return Ok(BuildOutcome::NoDocuments);
    }

    // Extract and chunk everything up front; embedding only starts once the
    // whole store has been read successfully.
    let mut per_document: Vec<(StoredDocument, Vec<Chunk>)> = Vec::with_capacity(documents.len());
    let mut total_chunks = 0usize;

    for doc in documents {
        let bytes = std::fs::read(&doc.path)
            .with_context(|| format!("Failed to read document: {}", doc.path.display()))?;
        let text = extract::extract_pdf_text(&bytes)
            .map_err(anyhow::Error::from)
            .with_context(|| format!("Failed to extract text from '{}'", doc.filename))?;

        let chunks = chunk_text(
            &doc.filename,
            &text,
            config.chunking.chunk_size,
            config.chunking.chunk_overlap,
        );
        total_chunks += chunks.len();
        per_document.push((doc, chunks));
    }

    if total_chunks == 0 {
        println!(
            "No text could be extracted from {} document(s). Aborting without writing.",
            per_document.len()
        );
        return Ok(BuildOutcome::NoText {
            documents: per_document.len(),
        });
    }

    std::fs::create_dir_all(&config.store.index_dir)?;
    let staging = config.index_staging_path();
    remove_index_files(&staging);

    let pool = db::open(&staging).await?;
    let write_result = write_index(&pool, embedder, &per_document).await;
    pool.close().await;

    if let Err(e) = write_result {
        remove_index_files(&staging);
        return Err(e);
    }

    // Atomic swap: the prior index stays valid until this rename.
    std::fs::rename(&staging, config.index_path()).with_context(|| {
        format!(
            "Failed to move staged index into place at {}",
            config.index_path().display()
        )
    })?;

    Ok(BuildOutcome::Built {
        documents: per_document.len(),
        chunks: total_chunks,
    })
}

async fn write_index(
    pool: &SqlitePool,
    embedder: &EmbeddingClient,
    per_document: &[(StoredDocument, Vec<Chunk>)],
) -> Result<()> {
    create_schema(pool).await?;

    for (doc, chunks) in per_document {
        sqlx::query(
            "INSERT INTO documents (filename, uploaded_at, size_bytes, chunk_count) VALUES (?, ?, ?, ?)",
        )
        .bind(&doc.filename)
        .bind(doc.uploaded_at.timestamp())
        .bind(doc.size_bytes as i64)
        .bind(chunks.len() as i64)
        .execute(pool)
        .await?;

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO chunks (id, filename, chunk_index, text, hash) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.filename)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .execute(pool)
            .await?;
        }
    }

    // Embed in batches, in store order.
    let all_chunks: Vec<&Chunk> = per_document.iter().flat_map(|(_, c)| c.iter()).collect();
    for batch in all_chunks.chunks(embedder.batch_size()) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder
            .embed_batch(&texts)
            .await
            .context("Embedding service request failed during index build")?;

        for (chunk, vector) in batch.iter().zip(vectors.iter()) {
            sqlx::query("INSERT INTO chunk_vectors (chunk_id, embedding) VALUES (?, ?)")
                .bind(&chunk.id)
                .bind(vec_to_blob(vector))
                .execute(pool)
                .await?;
        }
    }

    write_meta(pool, META_SCHEMA_VERSION, SCHEMA_VERSION).await?;
    write_meta(pool, META_EMBEDDING_MODEL, embedder.model_name()).await?;
    write_meta(pool, META_EMBEDDING_DIMS, &embedder.dims().to_string()).await?;
    write_meta(
        pool,
        META_BUILT_AT,
        &chrono::Utc::now().timestamp().to_string(),
    )
    .await?;

    Ok(())
}

pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            filename TEXT PRIMARY KEY,
            uploaded_at INTEGER NOT NULL,
            size_bytes INTEGER NOT NULL,
            chunk_count INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            filename TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL,
            UNIQUE(filename, chunk_index),
            FOREIGN KEY (filename) REFERENCES documents(filename)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunk_vectors (
            chunk_id TEXT PRIMARY KEY,
            embedding BLOB NOT NULL,
            FOREIGN KEY (chunk_id) REFERENCES chunks(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_filename ON chunks(filename)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn read_meta(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM index_meta WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

async fn write_meta(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO index_meta (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// Best-effort removal of a database file and its journal siblings.
fn remove_index_files(path: &Path) {
    let _ = std::fs::remove_file(path);
    for suffix in ["-journal", "-wal", "-shm"] {
        let mut side = path.as_os_str().to_os_string();
        side.push(suffix);
        let _ = std::fs::remove_file(std::path::PathBuf::from(side));
    }
}
