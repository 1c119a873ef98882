//! Findings: the cross-cutting record of audit observations, owned
//! centrally by the controller and referenced by originating stage.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// The four finding categories recognized by the report's 7.2 tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FindingCategory {
    /// Abweichung geringfügig — minor deviation.
    #[serde(rename = "AG")]
    MinorDeviation,
    /// Abweichung schwerwiegend — severe deviation.
    #[serde(rename = "AS")]
    SevereDeviation,
    /// Empfehlung — recommendation.
    #[serde(rename = "E")]
    Recommendation,
    /// Ok — no deviation, informational.
    #[serde(rename = "OK")]
    Ok,
}

impl fmt::Display for FindingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::MinorDeviation => "AG",
            Self::SevereDeviation => "AS",
            Self::Recommendation => "E",
            Self::Ok => "OK",
        };
        write!(f, "{code}")
    }
}

/// A single audit finding, sequentially numbered within its category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Stable ID in the form `"<category>-<sequence>"`, e.g. `"AG-03"`.
    pub id: String,
    /// The finding's category.
    pub category: FindingCategory,
    /// Human-readable description.
    pub description: String,
    /// Free-form status note (e.g. resolution state carried over from a
    /// previous audit report).
    pub status: Option<String>,
    /// Name of the stage that raised this finding.
    pub originating_stage: String,
}

/// Normalizes a finding description for duplicate detection: lowercased,
/// with runs of whitespace collapsed to a single space.
#[must_use]
pub fn normalize_description(description: &str) -> String {
    description
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Owns finding ID assignment and duplicate detection across the whole
/// run. The controller is the only holder of a `FindingLedger`; no stage
/// assigns its own ID.
#[derive(Debug, Default)]
pub struct FindingLedger {
    next_sequence: HashMap<FindingCategory, u32>,
    seen: HashSet<(FindingCategory, String)>,
    findings: Vec<Finding>,
}

impl FindingLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the ledger with findings carried over from a previous audit
    /// report scan, preserving their existing IDs and advancing the
    /// per-category sequence counters past them.
    pub fn seed(&mut self, findings: Vec<Finding>) {
        for finding in findings {
            if let Some(sequence) = sequence_from_id(&finding.id) {
                let entry = self.next_sequence.entry(finding.category).or_insert(1);
                *entry = (*entry).max(sequence + 1);
            }
            self.seen.insert((
                finding.category,
                normalize_description(&finding.description),
            ));
            self.findings.push(finding);
        }
    }

    /// Appends a new finding, assigning it the next sequence number in its
    /// category unless a finding with the same `(category, normalized
    /// description)` has already been recorded, in which case it is
    /// silently dropped as a duplicate. Returns the finalized ID if the
    /// finding was appended.
    pub fn append(
        &mut self,
        category: FindingCategory,
        description: String,
        status: Option<String>,
        originating_stage: &str,
    ) -> Option<String> {
        let key = (category, normalize_description(&description));
        if self.seen.contains(&key) {
            return None;
        }
        let sequence = self.next_sequence.entry(category).or_insert(1);
        let id = format!("{category}-{:02}", *sequence);
        *sequence += 1;
        self.seen.insert(key);
        self.findings.push(Finding {
            id: id.clone(),
            category,
            description,
            status,
            originating_stage: originating_stage.to_string(),
        });
        Some(id)
    }

    /// Returns every finding recorded so far, in append order.
    #[must_use]
    pub fn all(&self) -> &[Finding] {
        &self.findings
    }
}

fn sequence_from_id(id: &str) -> Option<u32> {
    id.rsplit_once('-').and_then(|(_, n)| n.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_sequential_ids_per_category() {
        let mut ledger = FindingLedger::new();
        let a = ledger
            .append(FindingCategory::MinorDeviation, "first".into(), None, "s1")
            .unwrap();
        let b = ledger
            .append(FindingCategory::MinorDeviation, "second".into(), None, "s1")
            .unwrap();
        assert_eq!(a, "AG-01");
        assert_eq!(b, "AG-02");
    }

    #[test]
    fn dedups_by_category_and_normalized_description() {
        let mut ledger = FindingLedger::new();
        ledger
            .append(FindingCategory::Recommendation, "Do the thing".into(), None, "s1")
            .unwrap();
        let dup = ledger.append(
            FindingCategory::Recommendation,
            "do   the thing".into(),
            None,
            "s2",
        );
        assert!(dup.is_none());
        assert_eq!(ledger.all().len(), 1);
    }

    #[test]
    fn seed_preserves_ids_and_advances_sequence() {
        let mut ledger = FindingLedger::new();
        ledger.seed(vec![Finding {
            id: "AS-03".into(),
            category: FindingCategory::SevereDeviation,
            description: "carried over".into(),
            status: Some("open".into()),
            originating_stage: "previous-report-scan".into(),
        }]);
        let next = ledger
            .append(FindingCategory::SevereDeviation, "new one".into(), None, "s1")
            .unwrap();
        assert_eq!(next, "AS-04");
    }

    #[test]
    fn category_display_matches_report_codes() {
        assert_eq!(FindingCategory::MinorDeviation.to_string(), "AG");
        assert_eq!(FindingCategory::SevereDeviation.to_string(), "AS");
        assert_eq!(FindingCategory::Recommendation.to_string(), "E");
        assert_eq!(FindingCategory::Ok.to_string(), "OK");
    }

    #[test]
    fn normalize_description_collapses_whitespace_and_case() {
        assert_eq!(
            normalize_description("  Hello   World  "),
            normalize_description("hello world")
        );
    }
}
