//! JSON-schema construction and validation for structured generation.
//!
//! Schemas are first-class data: every [`Schema`] is built once (usually via
//! [`schemars`]) and validated at construction time to reject tuple-form
//! `items` arrays, which providers handle inconsistently for structured
//! generation.

use jsonschema::Validator;
use schemars::JsonSchema;
use schemars::schema_for;
use serde_json::Value;

use crate::error::{LlmError, Result};

/// A JSON schema a structured-generation response must validate against.
#[derive(Debug, Clone)]
pub struct Schema {
    /// The raw schema document.
    pub document: Value,
}

impl Schema {
    /// Builds a schema from a `schemars`-derived type, rejecting any
    /// tuple-validation `items` arrays found anywhere in the document.
    pub fn for_type<T: JsonSchema>() -> Result<Self> {
        let schema = schema_for!(T);
        let document = serde_json::to_value(&schema)?;
        Self::from_value(document)
    }

    /// Builds a schema from a raw JSON value, e.g. for a dynamically
    /// constructed schema whose required fields depend on run-time data
    /// (the classification schema's per-document-set required list).
    pub fn from_value(document: Value) -> Result<Self> {
        reject_tuple_validation(&document)?;
        Ok(Self { document })
    }

    /// Compiles a validator and checks `value` against it.
    pub fn validate(&self, value: &Value) -> Result<()> {
        let validator = Validator::new(&self.document)
            .map_err(|e| LlmError::Schema(format!("invalid schema: {e}")))?;
        let errors: Vec<String> = validator
            .iter_errors(value)
            .map(|e| e.to_string())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(LlmError::Schema(errors.join("; ")).into())
        }
    }
}

/// Walks a schema document and returns an error if any `items` keyword uses
/// array (tuple-validation) form instead of a single schema.
fn reject_tuple_validation(document: &Value) -> Result<()> {
    fn walk(value: &Value) -> Result<()> {
        if let Value::Object(map) = value {
            if let Some(items) = map.get("items") {
                if items.is_array() {
                    return Err(LlmError::TupleValidationForbidden(
                        "schema uses array-form `items` (tuple validation)".to_string(),
                    )
                    .into());
                }
                walk(items)?;
            }
            for (key, v) in map {
                if key != "items" {
                    walk(v)?;
                }
            }
        } else if let Value::Array(items) = value {
            for item in items {
                walk(item)?;
            }
        }
        Ok(())
    }
    walk(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, JsonSchema)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn builds_schema_from_type() {
        let schema = Schema::for_type::<Sample>().unwrap();
        assert!(schema.document.is_object());
    }

    #[test]
    fn rejects_tuple_validation_items() {
        let document = json!({
            "type": "array",
            "items": [{"type": "string"}, {"type": "number"}]
        });
        let err = Schema::from_value(document).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Llm(LlmError::TupleValidationForbidden(_))
        ));
    }

    #[test]
    fn accepts_single_schema_items() {
        let document = json!({
            "type": "array",
            "items": {"type": "string"}
        });
        assert!(Schema::from_value(document).is_ok());
    }

    #[test]
    fn validate_reports_schema_mismatch() {
        let schema = Schema::for_type::<Sample>().unwrap();
        let bad = json!({"name": "x"});
        assert!(schema.validate(&bad).is_err());

        let good = json!({"name": "x", "count": 1});
        assert!(schema.validate(&good).is_ok());
    }
}
