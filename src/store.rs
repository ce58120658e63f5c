//! Document store: a directory of raw uploaded PDFs.
//!
//! Uploads land here under a sanitized filename; the index builder reads the
//! directory back with a recursive `**/*.pdf` scan. Files accumulate; the
//! store never deletes.

use anyhow::Result;
use chrono::{TimeZone, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::models::StoredDocument;

/// Reduce an uploaded filename to a safe basename: path components are
/// dropped and anything outside `[A-Za-z0-9._-]` becomes `_`. Empty or
/// dot-only results fall back to `upload.pdf`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim();

    let mut out = String::with_capacity(base.len());
    for c in base.chars() {
        if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
            out.push(c);
        } else {
            out.push('_');
        }
    }

    let trimmed = out.trim_matches(['.', '_']).to_string();
    if trimmed.is_empty() {
        "upload.pdf".to_string()
    } else {
        out
    }
}

/// Persist uploaded bytes into the document store, creating the directory
/// on first use. Returns the path written.
pub fn save_document(config: &Config, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
    let dir = &config.store.documents_dir;
    std::fs::create_dir_all(dir)?;

    let path = dir.join(filename);
    std::fs::write(&path, bytes)?;
    Ok(path)
}

/// Enumerate all PDFs in the document store, deterministically ordered by
/// filename. An absent directory is an empty store, not an error.
pub fn scan_documents(config: &Config) -> Result<Vec<StoredDocument>> {
    let root = &config.store.documents_dir;
    if !root.exists() {
        return Ok(Vec::new());
    }

    let include_set = pdf_globset()?;
    let mut documents = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if !include_set.is_match(relative) {
            continue;
        }

        documents.push(file_to_document(path)?);
    }

    // Sort for deterministic ordering
    documents.sort_by(|a, b| a.filename.cmp(&b.filename));

    Ok(documents)
}

fn file_to_document(path: &Path) -> Result<StoredDocument> {
    let metadata = std::fs::metadata(path)?;
    let modified = metadata
        .modified()
        .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
    let modified_secs = modified
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok(StoredDocument {
        filename,
        path: path.to_path_buf(),
        uploaded_at: Utc.timestamp_opt(modified_secs, 0).unwrap(),
        size_bytes: metadata.len(),
    })
}

fn pdf_globset() -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    builder.add(Glob::new("**/*.pdf")?);
    builder.add(Glob::new("**/*.PDF")?);
    Ok(builder.build()?)
}
