use std::path::PathBuf;

use clap::{Parser, Subcommand};
use memex::config::Config;
use memex_cli::commands::{ClearCommand, ConfigCommand, ListCommand, StatsCommand};
use memex_cli::error::CliResult;
use memex_cli::output::OutputFormat;
use memex_cli::store::open_store;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "memex-cli")]
#[command(about = "Memex CLI - Management tool for the memex snapshot")]
#[command(version)]
pub struct Cli {
    #[clap(long, short, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[clap(long, short = 's', global = true, help = "Path to the snapshot file")]
    pub snapshot: Option<PathBuf>,

    #[clap(long, short = 'c', global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Show store statistics")]
    Stats(StatsCommand),

    #[clap(about = "List stored chunks")]
    List(ListCommand),

    #[clap(about = "Delete chunks by session, user, or all of them")]
    Clear(ClearCommand),

    #[clap(about = "Configuration commands")]
    Config(ConfigCommand),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> CliResult<()> {
    init_logging();

    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    let config = Config::load(cli.config.as_deref())?;

    match &cli.command {
        Command::Config(cmd) => cmd.execute(&config, cli.config.as_deref(), format),
        Command::Stats(cmd) => {
            let store = open_store(&config, cli.snapshot.as_deref())?;
            cmd.execute(&store, format)
        }
        Command::List(cmd) => {
            let store = open_store(&config, cli.snapshot.as_deref())?;
            cmd.execute(&store, format)
        }
        Command::Clear(cmd) => {
            let mut store = open_store(&config, cli.snapshot.as_deref())?;
            cmd.execute(&mut store, format)
        }
    }
}

fn init_logging() {
    // Quiet by default so table and JSON output stay clean
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
