//! ollama-agent CLI
//!
//! Runs the arithmetic tool-calling agent, a plain chat completion, or a
//! model listing against a local Ollama server.

mod commands;
mod config;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{provider::ModelInfo, AgentError, LlmProvider};
use agent_runtime::OllamaProvider;

use crate::config::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment before parsing so .env feeds the flag fallbacks
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "debug".to_string()
    } else {
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into())
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = dispatch(cli).await {
        let agent_err = err.downcast_ref::<AgentError>();
        if let Some(agent_err) = agent_err {
            eprintln!("{}", agent_err.user_message());
        }
        eprintln!("Error: {err:#}");
        std::process::exit(exit_code(agent_err));
    }

    Ok(())
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let config = cli.server.ollama_config();
    let provider: Arc<dyn LlmProvider> = Arc::new(OllamaProvider::from_config(config)?);
    let options = cli.generation.options();

    match &cli.command {
        Command::Models => commands::models(provider.as_ref()).await,
        Command::Chat { prompt } => {
            check_server(provider.as_ref(), &options.model).await;
            commands::chat(provider.as_ref(), &options, prompt).await
        }
        Command::Run(args) => {
            check_server(provider.as_ref(), &options.model).await;
            commands::run(provider, options, args).await
        }
    }
}

/// Warn early when Ollama is down or the model is not installed
async fn check_server(provider: &dyn LlmProvider, model: &str) {
    match provider.health_check().await {
        Ok(true) => {
            tracing::info!("✓ Connected to Ollama");
            if let Ok(models) = provider.list_models().await {
                if !is_installed(&models, model) {
                    tracing::warn!("⚠ Model '{}' is not installed", model);
                    tracing::warn!("  Pull it with: ollama pull {}", model);
                }
            }
        }
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ Ollama not available - agent will fail");
            tracing::warn!("  Make sure Ollama is running: ollama serve");
        }
    }
}

/// `EX_TEMPFAIL` when the failure may go away on retry
fn exit_code(err: Option<&AgentError>) -> i32 {
    if err.is_some_and(AgentError::is_retryable) { 75 } else { 1 }
}

/// Untagged names match their `:latest` tag, the way `ollama run` resolves them
fn is_installed(models: &[ModelInfo], model: &str) -> bool {
    models.iter().any(|m| {
        m.id == model
            || (!model.contains(':') && m.id.strip_suffix(":latest") == Some(model))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn installed(ids: &[&str]) -> Vec<ModelInfo> {
        ids.iter()
            .map(|id| ModelInfo {
                id: (*id).into(),
                name: (*id).into(),
                size_bytes: None,
            })
            .collect()
    }

    #[test]
    fn test_untagged_model_matches_latest() {
        let models = installed(&["llama3.2:latest", "qwen3-vl:8b"]);

        assert!(is_installed(&models, "llama3.2"));
        assert!(is_installed(&models, "llama3.2:latest"));
        assert!(is_installed(&models, "qwen3-vl:8b"));
        assert!(!is_installed(&models, "qwen3-vl"));
        assert!(!is_installed(&models, "llama3.2:1b"));
        assert!(!is_installed(&models, "llama3"));
    }

    #[test]
    fn test_exit_code() {
        let unreachable = AgentError::ProviderUnavailable("refused".into());
        assert_eq!(exit_code(Some(&unreachable)), 75);
        assert_eq!(exit_code(Some(&AgentError::MaxIterations(10))), 1);
        assert_eq!(exit_code(None), 1);
    }
}
