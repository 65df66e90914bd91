use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;
use valemain::transport::{ChatTransport, HttpTransport, Role, TransportError};
use valemain::view::render_until;
use valemain::{ChatConfig, ChatSession, ConfigError, SessionOptions};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("stdin read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "valemain", about = "Valemain Corp autonomous fleet chat")]
struct Cli {
    /// Backend base URL; overrides `VALEMAIN_API_BASE_URL`.
    #[arg(long)]
    base_url: Option<String>,

    /// Rider id forwarded with each message; overrides `VALEMAIN_USER_ID`.
    #[arg(long)]
    user_id: Option<String>,

    /// Debug logging for this crate (ignored when `RUST_LOG` is set).
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive chat, starting with dispatch.
    Chat,
    /// Send a single message and print the raw reply.
    Ask {
        #[arg(long, default_value = "core")]
        role: Role,
        message: String,
    },
    /// Check that the backend is up.
    Health,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(error) = dotenvy::dotenv() {
        tracing::debug!(%error, "no .env file loaded");
    }

    let config = ChatConfig::from_env()?.with_overrides(cli.base_url, cli.user_id);
    let transport = HttpTransport::from_config(&config)?;
    tracing::debug!(base_url = transport.base_url(), "transport ready");

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat(&config, transport).await,
        Command::Ask { role, message } => run_ask(&config, &transport, role, &message).await,
        Command::Health => run_health(&transport).await,
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "valemain=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_chat(config: &ChatConfig, transport: HttpTransport) -> Result<(), CliError> {
    let session = ChatSession::new(Arc::new(transport), SessionOptions::from(config));

    println!("VALEMAIN CORP");
    println!("Autonomous Fleet Command  (/quit to exit)");
    println!();

    let (stop_renderer, stopped) = oneshot::channel();
    let renderer = tokio::spawn(render_until(session.clone(), stopped, |line| println!("{line}")));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim() == "/quit" {
            break;
        }
        session.send(&line).await;
    }

    drop(stop_renderer);
    if let Err(error) = renderer.await {
        tracing::warn!(%error, "renderer task failed");
    }
    tracing::debug!(session_id = %session.id(), "chat session ended");
    Ok(())
}

async fn run_ask(config: &ChatConfig, transport: &HttpTransport, role: Role, message: &str) -> Result<(), CliError> {
    let reply = transport.chat(role, message, config.user_id.as_deref()).await?;
    print_json(&reply)
}

async fn run_health(transport: &HttpTransport) -> Result<(), CliError> {
    let health = transport.health().await?;
    print_json(&health)
}

fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
