//! Per-page PDF text extraction.
//!
//! No example repo in the retrieval pack parses PDFs; `lopdf` is the
//! standard real crate for structural PDF access and is used here for that
//! reason alone (see DESIGN.md).

use lopdf::Document as LopdfDocument;

use crate::error::{ObjectStoreError, Result};

/// The text content of a single PDF page, 1-indexed to match how BSI
/// documents are cited (`page 12`, not `page 11`).
#[derive(Debug, Clone)]
pub struct PageText {
    /// 1-indexed page number.
    pub page_number: u32,
    /// Extracted text content of the page.
    pub text: String,
}

/// Extracts text from every page of a PDF given as raw bytes.
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<PageText>> {
    let document = LopdfDocument::load_mem(bytes)
        .map_err(|e| ObjectStoreError::Serialization(format!("failed to parse PDF: {e}")))?;

    let mut pages = Vec::new();
    for page_number in document.get_pages().into_keys() {
        let text = document
            .extract_text(&[page_number])
            .unwrap_or_default();
        pages.push(PageText { page_number, text });
    }
    pages.sort_by_key(|p| p.page_number);
    Ok(pages)
}

/// Total page count of a PDF given as raw bytes, without extracting text.
pub fn page_count(bytes: &[u8]) -> Result<u32> {
    let document = LopdfDocument::load_mem(bytes)
        .map_err(|e| ObjectStoreError::Serialization(format!("failed to parse PDF: {e}")))?;
    Ok(u32::try_from(document.get_pages().len()).unwrap_or(u32::MAX))
}
