//! Subcommand implementations.
//!
//! Conversation output goes to stdout; everything else is logged to stderr.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;

use agent_core::{AgentBuilder, GenerationOptions, LlmProvider, Message};
use arith_tools::arithmetic_registry;

use crate::config::RunArgs;

/// Run the tool-calling loop and print the whole conversation
pub async fn run(
    provider: Arc<dyn LlmProvider>,
    options: GenerationOptions,
    args: &RunArgs,
) -> Result<()> {
    let tools = arithmetic_registry();
    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    let agent = AgentBuilder::new()
        .provider(provider)
        .tools(tools)
        .system_prompt(args.system_prompt())
        .generation(options)
        .max_iterations(args.max_iterations)
        .parallel_tools(args.parallel_tools)
        .build()?;

    let conversation = agent.invoke(args.prompt.as_str()).await?;

    let mut out = std::io::stdout().lock();
    for message in conversation.messages() {
        writeln!(out, "{message}")?;
    }
    Ok(())
}

/// One completion with no tools; streamed deltas are printed as they arrive
pub async fn chat(provider: &dyn LlmProvider, options: &GenerationOptions, prompt: &str) -> Result<()> {
    let messages = [Message::user(prompt)];
    let mut out = std::io::stdout();
    writeln!(out, "{}", messages[0])?;

    if !options.stream {
        let completion = provider.complete(&messages, &[], options).await?;
        writeln!(out, "{}", completion.into_message())?;
        return Ok(());
    }

    let mut stream = provider.complete_stream(&messages, &[], options).await?;
    write!(out, "[assistant]: ")?;
    out.flush()?;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if let Some(thinking) = &chunk.thinking {
            tracing::debug!(thinking = %thinking, "Thinking");
        }
        write!(out, "{}", chunk.delta)?;
        out.flush()?;

        if chunk.done {
            if let Some(usage) = chunk.usage {
                tracing::debug!(total_tokens = usage.total_tokens, "Stream finished");
            }
            break;
        }
    }
    writeln!(out)?;
    Ok(())
}

/// Print the locally installed models
pub async fn models(provider: &dyn LlmProvider) -> Result<()> {
    let models = provider.list_models().await?;
    if models.is_empty() {
        tracing::warn!("No models installed. Pull one with: ollama pull <model>");
    }

    let mut out = std::io::stdout().lock();
    for model in models {
        match model.size_bytes {
            Some(bytes) => writeln!(out, "{}\t{:.1} GB", model.id, gigabytes(bytes))?,
            None => writeln!(out, "{}", model.id)?,
        }
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn gigabytes(bytes: u64) -> f64 {
    bytes as f64 / 1_000_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gigabytes() {
        assert!((gigabytes(6_100_000_000) - 6.1).abs() < 1e-9);
        assert!(gigabytes(0).abs() < f64::EPSILON);
    }
}
