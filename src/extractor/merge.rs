//! Phase D: merges per-chunk requirement extractions into the final
//! deduplicated requirement set, one row per `(zielobjekt_kuerzel,
//! anforderung_id)`.

use std::collections::HashMap;

use chrono::NaiveDate;
use rayon::prelude::*;
use unicode_segmentation::UnicodeSegmentation;

use super::types::{Requirement, Umsetzungsstatus};
use crate::findings::normalize_description;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Merges every candidate extraction of the same requirement into one
/// row: status is the most severe candidate, title is the longest
/// non-empty candidate, explanation is the union of distinct sentences
/// across candidates (first-seen order), and date is the most recent
/// valid ISO date among candidates.
#[must_use]
pub fn merge_requirements(candidates: Vec<Requirement>) -> Vec<Requirement> {
    let groups: HashMap<(String, String), Vec<Requirement>> = candidates
        .into_par_iter()
        .fold(HashMap::new, |mut acc, req| {
            acc.entry(req.key()).or_default().push(req);
            acc
        })
        .reduce(HashMap::new, |mut a, b| {
            for (key, mut reqs) in b {
                a.entry(key).or_default().append(&mut reqs);
            }
            a
        });

    let mut merged: Vec<Requirement> = groups.into_values().map(merge_group).collect();
    merged.sort_by(|a, b| a.key().cmp(&b.key()));
    merged
}

fn merge_group(group: Vec<Requirement>) -> Requirement {
    debug_assert!(!group.is_empty());
    let zielobjekt_kuerzel = group[0].zielobjekt_kuerzel.clone();
    let anforderung_id = group[0].anforderung_id.clone();

    let umsetzungsstatus = group
        .iter()
        .map(|r| r.umsetzungsstatus)
        .max()
        .unwrap_or(Umsetzungsstatus::Entbehrlich);

    let titel = group
        .iter()
        .map(|r| r.titel.as_str())
        .filter(|t| !t.is_empty())
        .max_by_key(|t| t.len())
        .unwrap_or("")
        .to_string();

    let umsetzungserlaeuterung = merge_explanations(group.iter().map(|r| r.umsetzungserlaeuterung.as_str()));

    let datum_letzte_pruefung = group
        .iter()
        .filter_map(|r| r.datum_letzte_pruefung.as_deref())
        .filter_map(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).ok().map(|parsed| (parsed, d)))
        .max_by_key(|(parsed, _)| *parsed)
        .map(|(_, original)| original.to_string());

    Requirement {
        zielobjekt_kuerzel,
        anforderung_id,
        titel,
        umsetzungsstatus,
        umsetzungserlaeuterung,
        datum_letzte_pruefung,
    }
}

/// Concatenates unique sentences from every candidate explanation,
/// preserving first-seen order and treating sentences as equal when their
/// normalized (lowercased, whitespace-collapsed) forms match.
fn merge_explanations<'a>(explanations: impl Iterator<Item = &'a str>) -> String {
    let mut seen = std::collections::HashSet::new();
    let mut sentences = Vec::new();

    for explanation in explanations {
        for sentence in explanation.unicode_sentences() {
            let trimmed = sentence.trim();
            if trimmed.is_empty() {
                continue;
            }
            let key = normalize_description(trimmed);
            if seen.insert(key) {
                sentences.push(trimmed.to_string());
            }
        }
    }

    sentences.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(status: Umsetzungsstatus, titel: &str, explanation: &str, date: Option<&str>) -> Requirement {
        Requirement {
            zielobjekt_kuerzel: "SRV-01".into(),
            anforderung_id: "SYS.1.1.A3".into(),
            titel: titel.into(),
            umsetzungsstatus: status,
            umsetzungserlaeuterung: explanation.into(),
            datum_letzte_pruefung: date.map(str::to_string),
        }
    }

    #[test]
    fn merge_takes_most_severe_status() {
        let merged = merge_requirements(vec![
            req(Umsetzungsstatus::Ja, "t", "", None),
            req(Umsetzungsstatus::Nein, "t", "", None),
            req(Umsetzungsstatus::Teilweise, "t", "", None),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].umsetzungsstatus, Umsetzungsstatus::Nein);
    }

    #[test]
    fn merge_takes_longest_title() {
        let merged = merge_requirements(vec![
            req(Umsetzungsstatus::Ja, "Short", "", None),
            req(Umsetzungsstatus::Ja, "A Much Longer Requirement Title", "", None),
        ]);
        assert_eq!(merged[0].titel, "A Much Longer Requirement Title");
    }

    #[test]
    fn merge_deduplicates_sentences_case_insensitively() {
        let merged = merge_requirements(vec![
            req(Umsetzungsstatus::Ja, "t", "The control is implemented. Reviewed quarterly.", None),
            req(Umsetzungsstatus::Ja, "t", "the control is implemented. Audited annually.", None),
        ]);
        let sentence_count = merged[0].umsetzungserlaeuterung.split(". ").count();
        assert_eq!(sentence_count, 3);
    }

    #[test]
    fn merge_takes_most_recent_valid_date() {
        let merged = merge_requirements(vec![
            req(Umsetzungsstatus::Ja, "t", "", Some("2024-01-15")),
            req(Umsetzungsstatus::Ja, "t", "", Some("not-a-date")),
            req(Umsetzungsstatus::Ja, "t", "", Some("2025-06-01")),
        ]);
        assert_eq!(merged[0].datum_letzte_pruefung.as_deref(), Some("2025-06-01"));
    }

    #[test]
    fn distinct_requirements_stay_separate() {
        let mut a = req(Umsetzungsstatus::Ja, "t", "", None);
        a.anforderung_id = "SYS.1.1.A1".into();
        let mut b = req(Umsetzungsstatus::Ja, "t", "", None);
        b.anforderung_id = "SYS.1.1.A2".into();
        let merged = merge_requirements(vec![a, b]);
        assert_eq!(merged.len(), 2);
    }
}
