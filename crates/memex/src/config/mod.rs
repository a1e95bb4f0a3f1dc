use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::{MemexError, Result};
use crate::memory::chunker::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::memory::optimizer::DEFAULT_CHARS_PER_TOKEN;

/// Main configuration structure for Memex
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP API configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Snapshot location
    #[serde(default)]
    pub storage: StorageConfig,
    /// Ingestion window settings
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Embedding adapter configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Retrieval defaults
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

impl Config {
    /// Load configuration from `path`, or from the first default location
    /// that exists, falling back to built-in defaults.
    ///
    /// Default locations, in order: `~/.memex/config.toml`,
    /// `<config_dir>/memex/config.toml`, `./config.toml`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            tracing::info!("Loading config from: {}", path.display());
            return Self::from_file(path);
        }

        let default_paths = [
            dirs::home_dir().map(|h| h.join(".memex").join("config.toml")),
            dirs::config_dir().map(|c| c.join("memex").join("config.toml")),
            Some(PathBuf::from("config.toml")),
        ];

        for candidate in default_paths.iter().flatten() {
            if candidate.exists() {
                tracing::info!("Loading config from: {}", candidate.display());
                return Self::from_file(candidate);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MemexError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| MemexError::Config(format!("Failed to parse config: {e}")))
    }

    /// Full path of the snapshot file
    pub fn snapshot_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.snapshot_file)
    }
}

/// HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:3000")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Shared secret; takes precedence over `api_key_env`
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Environment variable consulted when `api_key` is unset
    #[serde(default = "default_server_api_key_env")]
    pub api_key_env: String,
    /// Whole-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            api_key: None,
            api_key_env: default_server_api_key_env(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ServerConfig {
    /// The configured shared secret, if any. Blank values count as unset.
    pub fn resolve_api_key(&self) -> Option<SecretString> {
        if let Some(key) = &self.api_key {
            if !key.expose_secret().trim().is_empty() {
                return Some(key.clone());
            }
        }

        std::env::var(&self.api_key_env)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(SecretString::new)
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_server_api_key_env() -> String {
    "MEMEX_API_KEY".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Snapshot location
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Base directory for all storage data
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Snapshot file name inside `data_dir`
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            snapshot_file: default_snapshot_file(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".memex"))
        .unwrap_or_else(|| PathBuf::from(".memex"))
}

fn default_snapshot_file() -> String {
    "memory.json".to_string()
}

/// Ingestion window settings, in characters
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

/// Which embedding adapter to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Deterministic lexical feature hashing, no network
    #[default]
    Hash,
    /// OpenAI-compatible `/v1/embeddings` endpoint
    OpenAi,
    /// Local ONNX model (requires the `local-embeddings` feature)
    FastEmbed,
}

impl EmbeddingProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hash => "hash",
            Self::OpenAi => "openai",
            Self::FastEmbed => "fastembed",
        }
    }
}

/// Embedding adapter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,
    /// Model name or identifier; each provider has its own default
    #[serde(default)]
    pub model: Option<String>,
    /// Vector dimension the adapter produces
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
    /// Upper bound for a single embedding call in seconds
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the remote provider
    #[serde(default)]
    pub api_url: Option<String>,
    /// Environment variable name for the remote provider's API key
    #[serde(default = "default_embedding_api_key_env")]
    pub api_key_env: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model: None,
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout_secs(),
            api_url: None,
            api_key_env: default_embedding_api_key_env(),
        }
    }
}

fn default_embedding_dimension() -> usize {
    384
}

fn default_embedding_timeout_secs() -> u64 {
    10
}

fn default_embedding_api_key_env() -> String {
    "EMBEDDING_API_KEY".to_string()
}

/// Retrieval defaults applied when a request leaves them out
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: usize,
    /// Characters per token for the budget estimate
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            default_max_tokens: default_max_tokens(),
            chars_per_token: default_chars_per_token(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

fn default_max_tokens() -> usize {
    4000
}

fn default_chars_per_token() -> f64 {
    DEFAULT_CHARS_PER_TOKEN
}
