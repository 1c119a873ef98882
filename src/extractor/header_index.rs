//! Phase A: pre-scans the Grundschutz-Check PDF's page text for Zielobjekt
//! section headers, producing full-coverage page ranges for Phase B.

use regex::Regex;

use crate::error::{Error, Result};
use crate::groundtruth::SystemStructureMap;
use crate::pdf::PageText;

use super::types::ZielobjektSection;

/// Builds the full-coverage list of Zielobjekt sections by matching each
/// page's leading text against `(kuerzel, name)` pairs from the system
/// structure map. Every page in `pages` belongs to exactly one section;
/// the final section's `end_page` is the document's last page.
pub fn build_sections(pages: &[PageText], structure: &SystemStructureMap) -> Result<Vec<ZielobjektSection>> {
    if pages.is_empty() {
        return Ok(Vec::new());
    }

    let mut header_pattern_by_kuerzel = Vec::new();
    for zielobjekt in &structure.zielobjekte {
        let escaped_kuerzel = regex::escape(&zielobjekt.kuerzel);
        let escaped_name = regex::escape(&zielobjekt.name);
        let pattern = format!(r"(?m)^\s*{escaped_kuerzel}\s+{escaped_name}");
        let regex = Regex::new(&pattern).map_err(|e| {
            Error::InvalidState {
                message: format!("invalid header regex for {}: {e}", zielobjekt.kuerzel),
            }
        })?;
        header_pattern_by_kuerzel.push((zielobjekt.kuerzel.clone(), regex));
    }

    let mut sections: Vec<ZielobjektSection> = Vec::new();
    for page in pages {
        let matched_kuerzel = header_pattern_by_kuerzel
            .iter()
            .find(|(_, regex)| regex.is_match(&page.text))
            .map(|(kuerzel, _)| kuerzel.clone());

        match matched_kuerzel {
            Some(kuerzel) => {
                sections.push(ZielobjektSection {
                    kuerzel,
                    start_page: page.page_number,
                    end_page: page.page_number,
                });
            }
            None => {
                if let Some(last) = sections.last_mut() {
                    last.end_page = page.page_number;
                } else {
                    // No header matched yet on the first page(s); assign to
                    // the synthetic Informationsverbund section so the
                    // whole document still has full coverage.
                    sections.push(ZielobjektSection {
                        kuerzel: crate::groundtruth::INFORMATIONSVERBUND.to_string(),
                        start_page: page.page_number,
                        end_page: page.page_number,
                    });
                }
            }
        }
    }

    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groundtruth::Zielobjekt;

    fn structure() -> SystemStructureMap {
        SystemStructureMap {
            zielobjekte: vec![
                Zielobjekt {
                    kuerzel: "SRV-01".into(),
                    name: "Produktionsserver".into(),
                },
                Zielobjekt {
                    kuerzel: "SRV-02".into(),
                    name: "Testserver".into(),
                },
            ],
            baustein_assignments: Default::default(),
        }
    }

    #[test]
    fn covers_every_page_with_no_gaps() {
        let pages = vec![
            PageText { page_number: 1, text: "SRV-01 Produktionsserver\nsome text".into() },
            PageText { page_number: 2, text: "more detail".into() },
            PageText { page_number: 3, text: "SRV-02 Testserver\nmore".into() },
            PageText { page_number: 4, text: "final page".into() },
        ];
        let sections = build_sections(&pages, &structure()).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].kuerzel, "SRV-01");
        assert_eq!((sections[0].start_page, sections[0].end_page), (1, 2));
        assert_eq!(sections[1].kuerzel, "SRV-02");
        assert_eq!((sections[1].start_page, sections[1].end_page), (3, 4));
    }

    #[test]
    fn leading_unmatched_pages_fall_to_informationsverbund() {
        let pages = vec![
            PageText { page_number: 1, text: "cover page".into() },
            PageText { page_number: 2, text: "SRV-01 Produktionsserver".into() },
        ];
        let sections = build_sections(&pages, &structure()).unwrap();
        assert_eq!(sections[0].kuerzel, crate::groundtruth::INFORMATIONSVERBUND);
    }
}
