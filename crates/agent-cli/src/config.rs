//! Command-line arguments and the settings derived from them.

use clap::{Args, Parser, Subcommand, ValueEnum};

use agent_core::{provider::DEFAULT_MODEL, GenerationOptions};
use agent_runtime::OllamaConfig;
use arith_tools::PromptLanguage;

/// Tool-calling arithmetic agent backed by a local Ollama server
#[derive(Debug, Parser)]
#[command(name = "agent-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run an arithmetic tool-calling agent against Ollama")]
pub struct Cli {
    #[command(flatten)]
    pub server: ServerArgs,

    #[command(flatten)]
    pub generation: GenerationArgs,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the agent loop with the add, multiply and divide tools
    Run(RunArgs),

    /// Single completion without tools
    Chat {
        /// The message to send
        prompt: String,
    },

    /// List the models installed on the server
    Models,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// The task for the agent
    pub prompt: String,

    /// Maximum model invocations before giving up
    #[arg(long, default_value_t = 10)]
    pub max_iterations: usize,

    /// Run the tool calls of one turn concurrently
    #[arg(long)]
    pub parallel_tools: bool,

    /// Override the system prompt
    #[arg(long)]
    pub system_prompt: Option<String>,

    /// Language of the built-in system prompt
    #[arg(long, value_enum, default_value_t = Lang::En)]
    pub lang: Lang,
}

impl RunArgs {
    pub fn system_prompt(&self) -> String {
        self.system_prompt
            .clone()
            .unwrap_or_else(|| PromptLanguage::from(self.lang).system_prompt().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Lang {
    En,
    Zh,
}

impl From<Lang> for PromptLanguage {
    fn from(lang: Lang) -> Self {
        match lang {
            Lang::En => Self::English,
            Lang::Zh => Self::Chinese,
        }
    }
}

/// Where the Ollama server lives
#[derive(Debug, Args)]
pub struct ServerArgs {
    /// Ollama host, optionally with a port
    #[arg(long, env = "OLLAMA_HOST", default_value = "http://127.0.0.1", global = true)]
    pub host: String,

    /// Ollama port; overrides a port given in --host
    #[arg(long, env = "OLLAMA_PORT", global = true)]
    pub port: Option<u16>,

    /// Request timeout in seconds
    #[arg(long, env = "OLLAMA_TIMEOUT_SECS", default_value_t = 120, global = true)]
    pub timeout: u64,
}

impl ServerArgs {
    pub fn ollama_config(&self) -> OllamaConfig {
        let mut config = OllamaConfig::from_base_url(&self.host);
        if let Some(port) = self.port {
            config.port = port;
        }
        config.timeout_secs = self.timeout;
        config
    }
}

/// Sampling settings sent with every request
#[derive(Debug, Args)]
pub struct GenerationArgs {
    /// Model name
    #[arg(long, env = "OLLAMA_MODEL", default_value = DEFAULT_MODEL, global = true)]
    pub model: String,

    #[arg(long, default_value_t = 0.7, global = true)]
    pub temperature: f32,

    #[arg(long, default_value_t = 0.7, global = true)]
    pub top_p: f32,

    /// Maximum tokens to generate per response
    #[arg(long, default_value_t = 1000, global = true)]
    pub max_tokens: u32,

    #[arg(long, default_value_t = 0.0, global = true)]
    pub frequency_penalty: f32,

    #[arg(long, default_value_t = 0.0, global = true)]
    pub presence_penalty: f32,

    /// Wait for whole responses instead of streaming
    #[arg(long, global = true)]
    pub no_stream: bool,

    /// Ask thinking models for their reasoning trace
    #[arg(long, global = true)]
    pub think: bool,
}

impl GenerationArgs {
    pub fn options(&self) -> GenerationOptions {
        GenerationOptions {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
            stop_sequences: Vec::new(),
            stream: !self.no_stream,
            think: self.think,
        }
    }
}
