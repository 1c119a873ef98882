//! Error types for the audit pipeline.
//!
//! A nested `thiserror` hierarchy covering every failure surface named in
//! the error-handling design: object store access, LLM calls, configuration,
//! and stage execution.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the audit pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Object store access failed.
    #[error("object store error: {0}")]
    ObjectStore(#[from] ObjectStoreError),

    /// An LLM call failed in a way that exhausted retries or cannot be
    /// retried at all.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Configuration is missing, malformed, or internally inconsistent.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A stage failed to run to completion.
    #[error("stage error: {0}")]
    Stage(#[from] StageError),

    /// A prerequisite stage's output is missing.
    #[error("missing prerequisite: stage {stage} requires output of {prerequisite}, which has not run")]
    MissingPrerequisite {
        /// The stage that could not run.
        stage: String,
        /// The prerequisite stage whose output was absent.
        prerequisite: String,
    },

    /// Invalid in-memory state reached during assembly or merge.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the invalid state.
        message: String,
    },

    /// A Grundschutz-Check chunking input was malformed.
    #[error("chunking error: {0}")]
    Chunking(#[from] ChunkingConfigError),
}

/// Errors raised while splitting Zielobjekt sections into extraction
/// chunks.
#[derive(Error, Debug)]
pub enum ChunkingConfigError {
    /// A section's page range is inverted or empty.
    #[error("invalid page range for {kuerzel}: {start}..{end}")]
    InvalidRange {
        /// Kuerzel of the offending section.
        kuerzel: String,
        /// Start page.
        start: u32,
        /// End page.
        end: u32,
    },
}

/// Object-store-specific errors.
#[derive(Error, Debug)]
pub enum ObjectStoreError {
    /// The requested key does not exist.
    #[error("object not found: {key}")]
    NotFound {
        /// The key that was not found.
        key: String,
    },

    /// The backend denied the operation.
    #[error("permission denied: {key}")]
    PermissionDenied {
        /// The key the operation was denied on.
        key: String,
    },

    /// A transient failure (network blip, throttling); safe to retry.
    #[error("transient object store failure: {0}")]
    Transient(String),

    /// A non-retryable backend failure.
    #[error("fatal object store failure: {0}")]
    Fatal(String),

    /// An atomic write lost a race to a concurrent writer.
    #[error("atomic write conflict at key: {key}")]
    WriteConflict {
        /// The key contested by concurrent writers.
        key: String,
    },

    /// Serialization/deserialization of a stored JSON document failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// LLM-interface-specific errors.
#[derive(Error, Debug)]
pub enum LlmError {
    /// A transient provider failure (rate limit, timeout, 5xx); safe to
    /// retry with backoff.
    #[error("transient LLM failure: {0}")]
    Transient(String),

    /// The provider's response did not conform to the requested schema,
    /// even after retries.
    #[error("LLM response did not match schema: {0}")]
    Schema(String),

    /// The provider refused to answer (content policy, safety block).
    #[error("LLM request blocked by provider: {0}")]
    Blocked(String),

    /// A non-retryable provider failure (auth error, model not found).
    #[error("fatal LLM failure: {0}")]
    Fatal(String),

    /// A requested schema used array-form `items` (tuple validation),
    /// which is forbidden for structured generation.
    #[error("schema uses forbidden tuple validation: {0}")]
    TupleValidationForbidden(String),

    /// The call exceeded its configured timeout.
    #[error("LLM call timed out after {seconds}s")]
    Timeout {
        /// Configured timeout, in seconds.
        seconds: u64,
    },
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required configuration value was absent.
    #[error("missing required configuration: {field}")]
    Missing {
        /// Name of the missing field.
        field: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Name of the invalid field.
        field: String,
        /// Reason the value is invalid.
        reason: String,
    },

    /// The config file could not be parsed.
    #[error("failed to parse configuration file: {0}")]
    ParseFailed(String),
}

/// Stage-execution errors.
#[derive(Error, Debug)]
pub enum StageError {
    /// The named stage is unknown to the controller.
    #[error("unknown stage: {name}")]
    UnknownStage {
        /// The unrecognized stage name.
        name: String,
    },

    /// The stage ran but failed after exhausting its retry budget.
    #[error("stage {name} failed: {reason}")]
    Failed {
        /// The stage that failed.
        name: String,
        /// Why it failed.
        reason: String,
    },

    /// The stage DAG contains a cycle.
    #[error("stage dependency graph contains a cycle involving: {stage}")]
    Cycle {
        /// A stage participating in the cycle.
        stage: String,
    },
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::ObjectStore(ObjectStoreError::Fatal(err.to_string()))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::ObjectStore(ObjectStoreError::Serialization(err.to_string()))
    }
}

impl From<serde_json::Error> for ObjectStoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<object_store::Error> for ObjectStoreError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => Self::NotFound { key: path },
            object_store::Error::PermissionDenied { path, .. } => {
                Self::PermissionDenied { key: path }
            }
            other => Self::Transient(other.to_string()),
        }
    }
}

impl From<object_store::Error> for Error {
    fn from(err: object_store::Error) -> Self {
        Self::ObjectStore(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_store_error_display() {
        let err = ObjectStoreError::NotFound {
            key: "document_map.json".to_string(),
        };
        assert_eq!(err.to_string(), "object not found: document_map.json");
    }

    #[test]
    fn missing_prerequisite_display() {
        let err = Error::MissingPrerequisite {
            stage: "Chapter4Cert".to_string(),
            prerequisite: "GroundTruthMap".to_string(),
        };
        assert!(err.to_string().contains("Chapter4Cert"));
        assert!(err.to_string().contains("GroundTruthMap"));
    }

    #[test]
    fn llm_error_variants_display() {
        assert!(
            LlmError::Transient("rate limited".into())
                .to_string()
                .contains("rate limited")
        );
        assert!(
            LlmError::Timeout { seconds: 7200 }
                .to_string()
                .contains("7200")
        );
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::ObjectStore(ObjectStoreError::Fatal(_))));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(
            err,
            Error::ObjectStore(ObjectStoreError::Serialization(_))
        ));
    }

    #[test]
    fn stage_error_cycle_display() {
        let err = StageError::Cycle {
            stage: "Chapter3".to_string(),
        };
        assert!(err.to_string().contains("Chapter3"));
    }
}
