//! PDF text extraction.
//!
//! The store holds raw PDF bytes; this module returns plain UTF-8 text.
//! Extraction itself is delegated to `pdf-extract`; the only local work is
//! text sanitation so a single odd document cannot poison an index build.

/// Extraction error. Callers decide whether to skip or fail the pipeline.
#[derive(Debug)]
pub enum ExtractError {
    Pdf(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extract plain text from PDF bytes.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let text =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(sanitize_text(&text))
}

/// Force text through a UTF-8 round trip, replacing anything that does not
/// survive with U+FFFD, and strip NULs that upset SQLite text storage.
pub fn sanitize_text(text: &str) -> String {
    let clean = String::from_utf8_lossy(text.as_bytes());
    clean.chars().filter(|c| *c != '\0').collect()
}
