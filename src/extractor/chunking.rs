//! Phase B: splits each Zielobjekt section into page-bounded chunks no
//! larger than [`MAX_PAGES_PER_CHUNK`], overlapping split chunks so a
//! requirement row spanning a chunk boundary is never silently cut.

use crate::error::{ChunkingConfigError, Result};

use super::types::{Chunk, ZielobjektSection};

/// Maximum number of pages any single extraction chunk may span.
pub const MAX_PAGES_PER_CHUNK: u32 = 25;

/// Page overlap applied when a section must be split across chunks. Within
/// the spec's allowed 2-10 page band.
pub const SPLIT_OVERLAP_PAGES: u32 = 5;

/// Splits a single section into one or more chunks, each at most
/// `MAX_PAGES_PER_CHUNK` pages, consecutive chunks overlapping by
/// `SPLIT_OVERLAP_PAGES` pages when a split is needed.
#[must_use]
pub fn chunk_section(section: &ZielobjektSection) -> Vec<Chunk> {
    let total_pages = section.end_page - section.start_page + 1;
    if total_pages <= MAX_PAGES_PER_CHUNK {
        return vec![Chunk {
            kuerzel: section.kuerzel.clone(),
            start_page: section.start_page,
            end_page: section.end_page,
        }];
    }

    let mut chunks = Vec::new();
    let mut start = section.start_page;
    loop {
        let end = (start + MAX_PAGES_PER_CHUNK - 1).min(section.end_page);
        chunks.push(Chunk {
            kuerzel: section.kuerzel.clone(),
            start_page: start,
            end_page: end,
        });
        if end >= section.end_page {
            break;
        }
        start = end.saturating_sub(SPLIT_OVERLAP_PAGES) + 1;
    }
    chunks
}

/// Splits every section in `sections` into chunks, in section order.
#[must_use]
pub fn chunk_all(sections: &[ZielobjektSection]) -> Vec<Chunk> {
    sections.iter().flat_map(chunk_section).collect()
}

/// Validates that a section's page range is well-formed before chunking.
pub fn validate_section(section: &ZielobjektSection) -> Result<()> {
    if section.end_page < section.start_page {
        return Err(ChunkingConfigError::InvalidRange {
            kuerzel: section.kuerzel.clone(),
            start: section.start_page,
            end: section.end_page,
        }
        .into());
    }
    Ok(())
}
