//! Report Blueprint: the typed template the assembler fills in with each
//! stage's content, addressed by dotted key path
//! (`"chapter3.3.6.1.findings"`).

use std::fmt;

use serde_json::Value;

/// A dotted path into a [`ReportBlueprint`]'s JSON tree, e.g. the path
/// `["chapter3", "3.6.1", "findings"]` displays as
/// `"chapter3.3.6.1.findings"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    /// Builds a key path from its dot-free segments.
    #[must_use]
    pub fn new(segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// The path's segments, outermost first.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// The report's typed template, loaded from a JSON document describing
/// every chapter/subchapter slot the assembler must populate.
#[derive(Debug, Clone)]
pub struct ReportBlueprint {
    root: Value,
}

impl ReportBlueprint {
    /// Wraps a blueprint document.
    #[must_use]
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// The report's default blueprint: one slot per chapter/subchapter
    /// named in the spec's chapter structure, each initialized to `null`
    /// until the assembler fills it in.
    #[must_use]
    pub fn default_template() -> Self {
        Self::from_value(serde_json::json!({
            "chapter1": null,
            "chapter3": {
                "3.1": null,
                "3.2": null,
                "3.3": null,
                "3.6.1": null
            },
            "chapter4": null,
            "chapter5": null,
            "chapter7": {
                "7.1": null,
                "7.2": {
                    "minor_deviations": [],
                    "severe_deviations": [],
                    "recommendations": []
                }
            }
        }))
    }

    /// Looks up `path` in the blueprint's tree, returning `None` (rather
    /// than an error) if any segment is missing — a missing slot is a
    /// non-fatal condition the caller logs and continues past.
    #[must_use]
    pub fn get(&self, path: &KeyPath) -> Option<&Value> {
        let mut current = &self.root;
        for segment in path.segments() {
            current = current.get(segment)?;
        }
        Some(current)
    }

    /// Returns the blueprint's root document, mutable, so the assembler
    /// can write filled-in chapter content back into the same tree shape
    /// the blueprint declared.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_path_displays_dotted() {
        let path = KeyPath::new(["chapter3", "3.6.1", "findings"]);
        assert_eq!(path.to_string(), "chapter3.3.6.1.findings");
    }

    #[test]
    fn get_returns_none_for_missing_slot() {
        let blueprint = ReportBlueprint::default_template();
        let path = KeyPath::new(["chapter9"]);
        assert!(blueprint.get(&path).is_none());
    }

    #[test]
    fn get_resolves_nested_slot() {
        let blueprint = ReportBlueprint::default_template();
        let path = KeyPath::new(["chapter3", "3.1"]);
        assert!(blueprint.get(&path).is_some());
    }
}
