//! workdraft CLI entry point.
//!
//! This binary is the composition root for the workspace. Responsibilities:
//!
//! 1. **Load configuration**: read `.env` (if present) and the process
//!    environment into an [`llm::AzureOpenAiConfig`], failing before any
//!    network activity when required settings are absent.
//! 2. **Wire observability**: see [`telemetry`].
//! 3. **Construct infrastructure**: build the [`llm::AzureOpenAiClient`] and
//!    inject it into a [`drafting::WorkItemAssistant`].
//! 4. **Run the command**: `gate`, `draft`, or `ping`, printing JSON results
//!    to stdout.

mod args;
mod telemetry;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use drafting::{AssistantError, ProcessName, WorkItemAssistant, WorkItemType};
use llm::{AzureOpenAiClient, AzureOpenAiConfig, Environment};
use serde_json::json;
use tokio::io::AsyncReadExt;
use tracing::{error, info};

use crate::args::{Cli, Command, DraftArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is normal outside local development.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let environment = std::env::var(llm::config::vars::ENVIRONMENT)
        .ok()
        .and_then(|v| v.parse::<Environment>().ok())
        .unwrap_or_default();
    let _telemetry = telemetry::init(environment)?;

    let result = run(cli).await;
    if let Err(err) = &result {
        match err.downcast_ref::<AssistantError>() {
            Some(assistant) => error!(
                error = %assistant,
                retry = ?assistant.retry_policy(),
                "command failed"
            ),
            None => error!(error = %err, "command failed"),
        }
    }
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let assistant = build_assistant()?;

    match cli.command {
        Command::Gate(input) => {
            let notes = read_text(&input.notes).await?;
            let gate = assistant.validate_notes(&notes).await?;
            print_json(&gate)
        }
        Command::Draft(args) => draft(&assistant, args).await,
        Command::Ping { prompt } => {
            let answer = assistant.respond(&prompt).await?;
            print_json(&json!({ "response": answer }))
        }
    }
}

fn build_assistant() -> anyhow::Result<WorkItemAssistant> {
    let config = AzureOpenAiConfig::from_env().map_err(AssistantError::from)?;
    info!(
        endpoint = %config.endpoint,
        deployment = %config.deployment,
        api_version = config.api_version.as_deref().unwrap_or("v1"),
        service_principal = config.service_principal.is_some(),
        "configuration loaded"
    );

    let client = AzureOpenAiClient::from_config(&config).context("could not build HTTP client")?;
    Ok(WorkItemAssistant::new(Arc::new(client)))
}

async fn draft(assistant: &WorkItemAssistant, args: DraftArgs) -> anyhow::Result<()> {
    let notes = read_text(&args.input.notes).await?;
    let work_item_type =
        WorkItemType::new(args.work_item_type).context("--type must not be blank")?;
    let process = ProcessName::new(args.process).context("--process must not be blank")?;
    let extra_context = match (&args.context, &args.context_file) {
        (Some(inline), _) => Some(inline.clone()),
        (None, Some(path)) => Some(read_text(path).await?),
        (None, None) => None,
    };

    if args.gated {
        let gate = assistant.validate_notes(&notes).await?;
        if !gate.is_valid() {
            info!(reason = gate.reason(), "notes rejected by gate; no draft generated");
            return print_json(&json!({ "gate": gate, "draft": null }));
        }
    }

    let draft = assistant
        .generate_draft(
            &notes,
            &work_item_type,
            &process,
            extra_context.as_deref(),
        )
        .await?;
    print_json(&draft)
}

/// Reads a file, or stdin when `path` is `-`.
async fn read_text(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("could not read stdin")?;
        return Ok(text);
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("could not read {}", path.display()))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
