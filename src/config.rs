//! Runtime configuration for the audit pipeline.
//!
//! Options are sourced from environment variables via `clap`'s `env`
//! attribute, with an optional TOML file providing defaults that the
//! environment and CLI flags override.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// The type of audit being performed, selecting which Chapter 4 prompt
/// bundle and validation rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditType {
    /// Initial certification audit.
    Cert,
    /// First surveillance audit.
    Surveillance1,
    /// Second surveillance audit.
    Surveillance2,
}

impl AuditType {
    /// Parses an audit type from its CLI/config string form.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cert" | "certification" => Ok(Self::Cert),
            "surveillance1" | "surv1" => Ok(Self::Surveillance1),
            "surveillance2" | "surv2" => Ok(Self::Surveillance2),
            other => Err(ConfigError::Invalid {
                field: "audit_type".to_string(),
                reason: format!("unknown audit type: {other}"),
            }
            .into()),
        }
    }
}

/// Full runtime configuration for a pipeline run.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Which audit-type variant governs Chapter 4.
    pub audit_type: AuditType,
    /// When true, stages must use deterministic/mocked LLM behavior only
    /// (no live provider calls), for reproducible CI runs.
    pub test_mode: bool,
    /// Maximum number of concurrent LLM calls across the whole run.
    pub max_concurrent_ai_requests: usize,
    /// Language the final report's prose is produced in.
    pub output_language: String,
    /// Object store connection URL (e.g. `s3://bucket`, `file:///data`).
    pub object_store_url: String,
    /// Prefix under which source documents are found (flat, no subfolders).
    pub source_prefix: String,
    /// Prefix under which all pipeline artifacts are written.
    pub output_prefix: String,
    /// Per-call LLM timeout, in seconds.
    pub llm_call_timeout_secs: u64,
    /// Chat-completion model used for structured generation.
    pub llm_model: String,
    /// Embedding model used for the LLM interface's optional `embed()` capability.
    pub llm_embedding_model: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            audit_type: AuditType::Cert,
            test_mode: false,
            max_concurrent_ai_requests: 5,
            output_language: "de".to_string(),
            object_store_url: "file://./data".to_string(),
            source_prefix: "source".to_string(),
            output_prefix: "output".to_string(),
            llm_call_timeout_secs: 7200,
            llm_model: "gpt-4o".to_string(),
            llm_embedding_model: "text-embedding-3-small".to_string(),
        }
    }
}

/// On-disk TOML override file, every field optional so a config file can
/// set only what it needs to and let the rest fall back to defaults.
#[derive(Debug, Default, Deserialize)]
struct TomlOverrides {
    audit_type: Option<String>,
    test_mode: Option<bool>,
    max_concurrent_ai_requests: Option<usize>,
    output_language: Option<String>,
    object_store_url: Option<String>,
    source_prefix: Option<String>,
    output_prefix: Option<String>,
    llm_call_timeout_secs: Option<u64>,
    llm_model: Option<String>,
    llm_embedding_model: Option<String>,
}

impl AuditConfig {
    /// Loads a config, applying an optional TOML file's values on top of
    /// the defaults. Returns [`ConfigError::ParseFailed`] on malformed TOML.
    pub fn load(toml_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        let Some(path) = toml_path else {
            return Ok(config);
        };
        if !path.exists() {
            return Ok(config);
        }
        let raw = std::fs::read_to_string(path)?;
        let overrides: TomlOverrides =
            toml::from_str(&raw).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;

        if let Some(audit_type) = overrides.audit_type {
            config.audit_type = AuditType::parse(&audit_type)?;
        }
        if let Some(v) = overrides.test_mode {
            config.test_mode = v;
        }
        if let Some(v) = overrides.max_concurrent_ai_requests {
            config.max_concurrent_ai_requests = v;
        }
        if let Some(v) = overrides.output_language {
            config.output_language = v;
        }
        if let Some(v) = overrides.object_store_url {
            config.object_store_url = v;
        }
        if let Some(v) = overrides.source_prefix {
            config.source_prefix = v;
        }
        if let Some(v) = overrides.output_prefix {
            config.output_prefix = v;
        }
        if let Some(v) = overrides.llm_call_timeout_secs {
            config.llm_call_timeout_secs = v;
        }
        if let Some(v) = overrides.llm_model {
            config.llm_model = v;
        }
        if let Some(v) = overrides.llm_embedding_model {
            config.llm_embedding_model = v;
        }
        Ok(config)
    }

    /// Validates that the configuration is internally consistent.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_ai_requests == 0 {
            return Err(ConfigError::Invalid {
                field: "max_concurrent_ai_requests".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if self.llm_call_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "llm_call_timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Default location for a user-level config file, following the
    /// platform config-directory convention.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("grundschutz-auditor").join("config.toml"))
    }

    /// Resolves a bare artifact name (e.g. `document_map.json`) to its full
    /// object store key under this run's output prefix.
    #[must_use]
    pub fn artifact_key(&self, name: &str) -> String {
        if self.output_prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{name}", self.output_prefix.trim_end_matches('/'))
        }
    }
}
