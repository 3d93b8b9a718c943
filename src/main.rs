//! quanty - chat with local Ollama models from the terminal.

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use quanty::cli;
use quanty::config::{Settings, DEFAULT_FALLBACK_MODELS, DEFAULT_MODEL, DEFAULT_SYSTEM_MESSAGE};
use quanty::models::DEFAULT_OLLAMA_URL;

/// quanty - stream replies from local language models
#[derive(Parser, Debug)]
#[command(name = "quanty")]
#[command(version, about, long_about = None)]
struct Args {
    /// Execute a single prompt and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Model to start with
    #[arg(short, long, env = "QUANTY_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Models to try, in order, when the preferred one is not installed
    #[arg(
        long,
        env = "QUANTY_FALLBACK_MODELS",
        value_delimiter = ',',
        default_values_t = DEFAULT_FALLBACK_MODELS.iter().map(|m| m.to_string())
    )]
    fallback_models: Vec<String>,

    /// Base URL of the Ollama server
    #[arg(long, env = "QUANTY_OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL)]
    ollama_url: String,

    /// System message sent with every request
    #[arg(long, env = "QUANTY_SYSTEM_MESSAGE", default_value = DEFAULT_SYSTEM_MESSAGE)]
    system_message: String,

    /// Pause after each streamed chunk, in milliseconds
    #[arg(long, env = "QUANTY_CHUNK_DELAY_MS", default_value_t = 10)]
    chunk_delay_ms: u64,

    /// How often the display refreshes while a reply streams, in milliseconds
    #[arg(long, env = "QUANTY_POLL_INTERVAL_MS", default_value_t = 100)]
    poll_interval_ms: u64,

    /// Give up connecting to the Ollama server after this many seconds
    #[arg(long, env = "QUANTY_CONNECT_TIMEOUT_SECS", default_value_t = 10)]
    connect_timeout_secs: u64,

    /// Check the Ollama connection and exit
    #[arg(long)]
    check: bool,

    /// Enable debug logging (equivalent to RUST_LOG=debug)
    #[arg(short = 'd', long)]
    debug: bool,

    /// Enable verbose logging (equivalent to RUST_LOG=trace)
    #[arg(short = 'v', long)]
    verbose: bool,
}

impl Args {
    fn settings(&self) -> Settings {
        Settings {
            ollama_url: self.ollama_url.clone(),
            model: self.model.clone(),
            fallback_models: self.fallback_models.clone(),
            system_message: self.system_message.clone(),
            chunk_delay: Duration::from_millis(self.chunk_delay_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }
}

fn init_tracing(args: &Args) {
    let default_filter = if args.verbose {
        "trace"
    } else if args.debug {
        "debug"
    } else {
        "warn" // Quiet by default; replies go to stdout
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if args.debug || args.verbose {
        tracing::info!("Debug logging enabled");
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    let settings = args.settings().validate()?;
    tracing::debug!(?settings, "Resolved settings");

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        if args.check {
            cli::run_check(&settings).await
        } else if let Some(prompt) = &args.prompt {
            if !cli::run_single_prompt(&settings, prompt).await? {
                std::process::exit(1);
            }
            Ok(())
        } else {
            cli::run_interactive(&settings).await
        }
    })
}
