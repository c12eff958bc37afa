//! PDF text extraction wrapper
//!
//! Wraps pdf-extract crate with error handling for:
//! - Encrypted or corrupted PDFs
//! - Scanned/image-only PDFs (no text layer)

use std::panic::{self, AssertUnwindSafe};

/// Below this many non-whitespace characters the PDF is treated as scanned
const MIN_TEXT_CHARS: usize = 20;

/// Extract full text from PDF bytes
///
/// Returns error for unreadable or scanned PDFs
pub fn extract_text_from_pdf(pdf_bytes: &[u8]) -> Result<String, String> {
    if pdf_bytes.is_empty() {
        return Err("PDF is empty".to_string());
    }
    if !pdf_bytes.starts_with(b"%PDF") {
        return Err("Not a PDF file (missing %PDF header)".to_string());
    }

    // pdf-extract panics on some malformed inputs instead of returning Err
    let result = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(pdf_bytes)))
        .map_err(|_| "PDF parser crashed on this file".to_string())?;
    let text = result.map_err(|e| format!("Failed to read PDF: {}", e))?;

    let text = normalize_whitespace(&text);
    let visible = text.chars().filter(|c| !c.is_whitespace()).count();
    if visible < MIN_TEXT_CHARS {
        return Err("PDF has no extractable text (scanned or image-only?)".to_string());
    }

    tracing::debug!(bytes = pdf_bytes.len(), chars = text.len(), "Extracted PDF text");
    Ok(text)
}

/// Collapse runs of blank lines and trailing spaces left by the extractor
fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}
