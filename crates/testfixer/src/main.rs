//! `testfixer` command-line entry point.
//!
//! Logs go to stderr; every command prints a single JSON document on stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{error, info};

use testfixer::adapters::{CircleCiClient, GitHubClient, OpenAiBackend, ReportFileSource};
use testfixer::{OrchestrationError, TestFixOrchestrator, TestFixerConfig, TestResultSource};
use triage::{FailureClassifier, FixBackend};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file (environment variables still take precedence)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Read failures from a JSON report instead of CircleCI
    #[arg(long, global = true)]
    report: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and classify the failing tests of a pipeline
    Analyze {
        /// CircleCI pipeline id
        pipeline: String,
    },
    /// Propose fixes without publishing them
    Propose {
        /// CircleCI pipeline id
        pipeline: String,
    },
    /// Propose fixes and open a pull request with the successful ones
    Fix {
        /// CircleCI pipeline id
        pipeline: String,
    },
    /// Print the resolved configuration with secrets masked
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = TestFixerConfig::load(args.config.as_deref())?;

    let output = match run(&args, &config).await {
        Ok(output) => output,
        Err(e) => {
            if let Some(orch_err) = e.downcast_ref::<OrchestrationError>() {
                error!(
                    category = %orch_err.retry_category(),
                    retriable = orch_err.is_retriable(),
                    "{orch_err}"
                );
            }
            return Err(e);
        }
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("Failed to serialize output")?
    );
    Ok(())
}

async fn run(args: &Args, config: &TestFixerConfig) -> Result<serde_json::Value> {
    match &args.command {
        Command::Config => Ok(serde_json::to_value(config.redacted())?),
        Command::Analyze { pipeline } => {
            let source = build_source(args, config)?;
            let failures = source
                .fetch_failures(pipeline)
                .await
                .map_err(|e| OrchestrationError::fetch(pipeline.as_str(), e))?;
            if failures.is_empty() {
                return Err(OrchestrationError::NoFailures(pipeline.clone()).into());
            }

            let classified = FailureClassifier::new().classify_many(&failures);
            let summary = FailureClassifier::summarize(&classified);
            info!(pipeline = %pipeline, total = summary.total, "analysis complete");
            Ok(json!({
                "pipeline": pipeline,
                "summary": summary,
                "failures": classified,
            }))
        }
        Command::Propose { pipeline } => {
            let orchestrator = build_orchestrator(args, config)?;
            let proposal = orchestrator.propose(pipeline).await?;
            Ok(json!({
                "pipeline": pipeline,
                "summary": proposal.summary(),
                "proposal": proposal,
                "patchSet": orchestrator.patch_set(&proposal),
            }))
        }
        Command::Fix { pipeline } => {
            config.require_github_token()?;
            let orchestrator = build_orchestrator(args, config)?;
            let (proposal, pull_request) = orchestrator.fix_and_publish(pipeline).await?;
            Ok(json!({
                "pipeline": pipeline,
                "summary": proposal.summary(),
                "proposal": proposal,
                "pullRequest": pull_request,
            }))
        }
    }
}

fn build_source(args: &Args, config: &TestFixerConfig) -> Result<Arc<dyn TestResultSource>> {
    if let Some(report) = &args.report {
        info!(path = %report.display(), "using failure report instead of CircleCI");
        return Ok(Arc::new(ReportFileSource::new(report)));
    }

    let token = config.require_circleci_token()?;
    let client = CircleCiClient::new(
        token,
        &config.circleci.base_url,
        &config.circleci.v1_base_url,
        config.http_timeout(),
    )
    .context("Failed to build CircleCI client")?;
    Ok(Arc::new(client))
}

fn build_orchestrator(args: &Args, config: &TestFixerConfig) -> Result<TestFixOrchestrator> {
    let source = build_source(args, config)?;
    let target = config.require_repository()?;

    let github = GitHubClient::new(
        config.github.token.clone().unwrap_or_default(),
        &config.github.base_url,
        config.http_timeout(),
    )
    .context("Failed to build GitHub client")?;

    let backend: Option<Arc<dyn FixBackend>> = match config.openai_api_key() {
        Some(key) => {
            let backend = OpenAiBackend::new(
                key,
                &config.openai.model,
                &config.openai.base_url,
                config.http_timeout(),
            )
            .context("Failed to build OpenAI client")?;
            info!(model = %config.openai.model, "generative strategies enabled");
            Some(Arc::new(backend) as Arc<dyn FixBackend>)
        }
        None => {
            info!("OPENAI_API_KEY not set, generative strategies disabled");
            None
        }
    };

    Ok(TestFixOrchestrator::new(
        source,
        Arc::new(github),
        target,
        backend,
        config.dispatch_config(),
    )
    .with_default_branch(&config.default_branch))
}
