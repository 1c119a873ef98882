//! Command execution: translates a parsed [`Cli`] invocation into a
//! configured [`AuditController`] run.

use std::sync::Arc;

use crate::config::AuditConfig;
use crate::controller::{AuditController, RunMode, RunSummary};
use crate::docfinder::DocumentFinder;
use crate::error::{ConfigError, Result};
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};
use crate::stages::{StageContext, StageName};

use super::parser::{Cli, Commands};

/// Builds the run configuration for this invocation: a TOML file (if any)
/// provides defaults, then CLI flags/environment variables (already
/// resolved into `cli` by clap) override individual fields.
fn build_config(cli: &Cli) -> Result<AuditConfig> {
    let toml_path = cli.config.clone().or_else(AuditConfig::default_path);
    let mut config = AuditConfig::load(toml_path.as_deref())?;

    if let Some(url) = &cli.object_store_url {
        config.object_store_url = url.clone();
    }
    if let Some(prefix) = &cli.source_prefix {
        config.source_prefix = prefix.clone();
    }
    if let Some(prefix) = &cli.output_prefix {
        config.output_prefix = prefix.clone();
    }
    if let Some(audit_type) = &cli.audit_type {
        config.audit_type = crate::config::AuditType::parse(audit_type)?;
    }
    if cli.test_mode {
        config.test_mode = true;
    }
    if let Some(n) = cli.max_concurrent_ai_requests {
        config.max_concurrent_ai_requests = n;
    }
    if let Some(language) = &cli.output_language {
        config.output_language = language.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Selects the `LlmClient` implementation for this run: the deterministic
/// mock when `--mock-llm` or `--test-mode` is set (so CI never needs
/// provider credentials), otherwise a live OpenAI-compatible client
/// configured from this run's concurrency and model settings.
fn build_llm_client(cli: &Cli, config: &AuditConfig) -> Arc<dyn LlmClient> {
    if cli.mock_llm || config.test_mode {
        Arc::new(MockLlmClient::new())
    } else {
        Arc::new(OpenAiClient::new(
            config.llm_model.clone(),
            config.llm_embedding_model.clone(),
            config.max_concurrent_ai_requests,
        ))
    }
}

/// Builds the full stage context — object store, LLM client, document
/// finder, and configuration — that every stage runs with.
async fn build_context(cli: &Cli, config: AuditConfig) -> Result<StageContext> {
    let store = crate::objectstore::from_config(&config).await?;
    let llm = build_llm_client(cli, &config);
    let finder = Arc::new(DocumentFinder::new(
        Arc::clone(&store),
        Arc::clone(&llm),
        config.source_prefix.clone(),
        config.output_prefix.clone(),
    ));
    Ok(StageContext { store, llm, finder, config })
}

/// Executes the run mode selected by `cli`, returning the resulting
/// [`RunSummary`]. This is the sole entry point `main` calls; formatting
/// and exit-code selection happen one layer up in [`super::output`].
pub async fn execute(cli: &Cli) -> Result<RunSummary> {
    let config = build_config(cli)?;
    let ctx = build_context(cli, config).await?;
    let controller = AuditController::new(ctx);

    let mode = match &cli.command {
        Commands::RunAll { force } => RunMode::RunAll { force: *force },
        Commands::RunStage { name, force } => {
            let stage = StageName::parse(name).ok_or_else(|| {
                ConfigError::Invalid {
                    field: "run-stage".to_string(),
                    reason: format!("unknown stage: {name}"),
                }
            })?;
            RunMode::RunStage { name: stage, force: *force }
        }
        Commands::GenerateReport => RunMode::GenerateReportOnly,
    };

    controller.run(mode).await
}
