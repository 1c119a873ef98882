//! Data model for the Grundschutz-Check Extractor: requirements and the
//! per-chunk extraction results that feed the merge-and-refine pass.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Implementation status of a single requirement, ordered by severity so
/// merge can take the most severe status across duplicate chunk
/// extractions of the same requirement: `Entbehrlich < Ja < Teilweise <
/// Nein`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Umsetzungsstatus {
    /// Entbehrlich — not applicable.
    Entbehrlich,
    /// Ja — implemented.
    Ja,
    /// Teilweise — partially implemented.
    Teilweise,
    /// Nein — not implemented.
    Nein,
}

impl Umsetzungsstatus {
    fn severity_rank(self) -> u8 {
        match self {
            Self::Entbehrlich => 0,
            Self::Ja => 1,
            Self::Teilweise => 2,
            Self::Nein => 3,
        }
    }
}

impl PartialOrd for Umsetzungsstatus {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Umsetzungsstatus {
    fn cmp(&self, other: &Self) -> Ordering {
        self.severity_rank().cmp(&other.severity_rank())
    }
}

/// A single BSI Grundschutz-Check requirement row, after merge-and-refine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    /// Kuerzel of the Zielobjekt this requirement applies to.
    pub zielobjekt_kuerzel: String,
    /// Anforderung ID, e.g. `"SYS.1.1.A3"`.
    pub anforderung_id: String,
    /// Requirement title.
    pub titel: String,
    /// Implementation status.
    pub umsetzungsstatus: Umsetzungsstatus,
    /// Free-form implementation explanation.
    pub umsetzungserlaeuterung: String,
    /// Date of the last review, if stated, in ISO-8601 (`YYYY-MM-DD`).
    pub datum_letzte_pruefung: Option<String>,
}

impl Requirement {
    /// Returns the `(zielobjekt_kuerzel, anforderung_id)` key merge groups
    /// requirement rows by.
    #[must_use]
    pub fn key(&self) -> (String, String) {
        (self.zielobjekt_kuerzel.clone(), self.anforderung_id.clone())
    }
}

/// A single page range assigned to one Zielobjekt section, found by the
/// header-index pre-scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZielobjektSection {
    /// Kuerzel of the section's Zielobjekt.
    pub kuerzel: String,
    /// First page of the section (1-indexed, inclusive).
    pub start_page: u32,
    /// Last page of the section (1-indexed, inclusive).
    pub end_page: u32,
}

/// One page-bounded unit of work for Phase C extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Kuerzel of the Zielobjekt this chunk belongs to.
    pub kuerzel: String,
    /// First page of the chunk (1-indexed, inclusive).
    pub start_page: u32,
    /// Last page of the chunk (1-indexed, inclusive).
    pub end_page: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_ordering_is_severity() {
        assert!(Umsetzungsstatus::Nein > Umsetzungsstatus::Teilweise);
        assert!(Umsetzungsstatus::Teilweise > Umsetzungsstatus::Ja);
        assert!(Umsetzungsstatus::Ja > Umsetzungsstatus::Entbehrlich);
    }

    #[test]
    fn requirement_key_pairs_kuerzel_and_id() {
        let req = Requirement {
            zielobjekt_kuerzel: "SRV-01".into(),
            anforderung_id: "SYS.1.1.A3".into(),
            titel: "t".into(),
            umsetzungsstatus: Umsetzungsstatus::Ja,
            umsetzungserlaeuterung: String::new(),
            datum_letzte_pruefung: None,
        };
        assert_eq!(req.key(), ("SRV-01".into(), "SYS.1.1.A3".into()));
    }
}
