use std::path::Path;

use clap::{Parser, Subcommand};
use memex::config::Config;
use secrecy::ExposeSecret;

use crate::error::CliResult;
use crate::output::{OutputFormat, new_table};

const REDACTED: &str = "(set, hidden)";
const NOT_SET: &str = "(not set)";

#[derive(Parser)]
pub struct ConfigCommand {
    #[clap(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    #[clap(about = "Show the effective configuration")]
    Show,
}

impl ConfigCommand {
    pub fn execute(
        &self,
        config: &Config,
        config_path: Option<&Path>,
        format: OutputFormat,
    ) -> CliResult<()> {
        match &self.command {
            ConfigSubcommand::Show => Self::show(config, config_path, format),
        }
    }

    fn show(config: &Config, config_path: Option<&Path>, format: OutputFormat) -> CliResult<()> {
        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&config_json(config))?);
            }
            OutputFormat::Table => {
                match config_path {
                    Some(path) => println!("Configuration from: {}", path.display()),
                    None => println!("Configuration: (default lookup)"),
                }
                println!("==============================\n");

                for (section, rows) in config_sections(config) {
                    println!("[{section}]");
                    let mut table = new_table(["Setting", "Value"]);
                    for (key, value) in rows {
                        table.add_row([key.to_string(), value]);
                    }
                    println!("{table}\n");
                }
            }
        }
        Ok(())
    }
}

/// Whether a key is available to the daemon, without revealing it.
fn api_key_state(config: &Config) -> &'static str {
    let configured = config
        .server
        .api_key
        .as_ref()
        .is_some_and(|k| !k.expose_secret().trim().is_empty());
    if configured {
        REDACTED
    } else if config.server.resolve_api_key().is_some() {
        "(from environment)"
    } else {
        NOT_SET
    }
}

fn config_sections(config: &Config) -> Vec<(&'static str, Vec<(&'static str, String)>)> {
    vec![
        (
            "server",
            vec![
                ("listen_addr", config.server.listen_addr.clone()),
                ("api_key", api_key_state(config).to_string()),
                ("api_key_env", config.server.api_key_env.clone()),
                (
                    "request_timeout_secs",
                    config.server.request_timeout_secs.to_string(),
                ),
            ],
        ),
        (
            "storage",
            vec![
                ("data_dir", config.storage.data_dir.display().to_string()),
                ("snapshot_file", config.storage.snapshot_file.clone()),
            ],
        ),
        (
            "chunking",
            vec![
                ("chunk_size", config.chunking.chunk_size.to_string()),
                ("chunk_overlap", config.chunking.chunk_overlap.to_string()),
            ],
        ),
        (
            "embedding",
            vec![
                ("provider", config.embedding.provider.as_str().to_string()),
                (
                    "model",
                    config.embedding.model.clone().unwrap_or_else(|| NOT_SET.to_string()),
                ),
                ("dimension", config.embedding.dimension.to_string()),
                ("timeout_secs", config.embedding.timeout_secs.to_string()),
                (
                    "api_url",
                    config
                        .embedding
                        .api_url
                        .clone()
                        .unwrap_or_else(|| NOT_SET.to_string()),
                ),
                ("api_key_env", config.embedding.api_key_env.clone()),
            ],
        ),
        (
            "retrieval",
            vec![
                ("default_top_k", config.retrieval.default_top_k.to_string()),
                (
                    "default_max_tokens",
                    config.retrieval.default_max_tokens.to_string(),
                ),
                ("chars_per_token", config.retrieval.chars_per_token.to_string()),
            ],
        ),
    ]
}

fn config_json(config: &Config) -> serde_json::Value {
    serde_json::json!({
        "server": {
            "listen_addr": config.server.listen_addr,
            "api_key": api_key_state(config),
            "api_key_env": config.server.api_key_env,
            "request_timeout_secs": config.server.request_timeout_secs,
        },
        "storage": {
            "data_dir": config.storage.data_dir.display().to_string(),
            "snapshot_file": config.storage.snapshot_file,
            "snapshot_path": config.snapshot_path().display().to_string(),
        },
        "chunking": {
            "chunk_size": config.chunking.chunk_size,
            "chunk_overlap": config.chunking.chunk_overlap,
        },
        "embedding": {
            "provider": config.embedding.provider.as_str(),
            "model": config.embedding.model,
            "dimension": config.embedding.dimension,
            "timeout_secs": config.embedding.timeout_secs,
            "api_url": config.embedding.api_url,
            "api_key_env": config.embedding.api_key_env,
        },
        "retrieval": {
            "default_top_k": config.retrieval.default_top_k,
            "default_max_tokens": config.retrieval.default_max_tokens,
            "chars_per_token": config.retrieval.chars_per_token,
        }
    })
}
