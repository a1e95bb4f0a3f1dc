//! Memex Daemon - HTTP API for the semantic memory store

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use memex::MemexError;
use memex::api::ApiServer;
use memex::config::Config;
use memex::embedding::build_embedder;
use memex::error::Result;
use memex::memory::MemoryManager;

/// Memex - semantic memory for LLM applications
#[derive(Parser)]
#[command(name = "memex")]
#[command(about = "A semantic memory store with chunked ingestion and token-budgeted retrieval")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the API server (default command)
    #[command(name = "serve")]
    Serve,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => serve(cli.config).await,
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,memex=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    tracing::info!("Starting Memex daemon");

    let config = Config::load(config_path.as_deref())?;
    tracing::debug!("Config loaded: {:?}", config);

    let api_key = config.server.resolve_api_key().ok_or_else(|| {
        MemexError::Config(format!(
            "No API key configured: set [server] api_key or the {} environment variable",
            config.server.api_key_env
        ))
    })?;

    let embedder = build_embedder(&config.embedding)?;
    let manager = Arc::new(MemoryManager::from_config(&config, embedder)?);
    tracing::info!("Memory store ready: {} chunks", manager.stats().await.total_chunks);

    let server = ApiServer::new(
        config.server.clone(),
        config.retrieval.clone(),
        manager,
        api_key,
    );
    server.serve().await?;

    tracing::info!("Memex daemon stopped");
    Ok(())
}
