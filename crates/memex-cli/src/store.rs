//! Opening the snapshot the daemon writes

use std::path::Path;

use memex::config::Config;
use memex::storage::{StoreSettings, VectorStore};

use crate::error::CliResult;

pub fn store_settings(config: &Config) -> StoreSettings {
    StoreSettings {
        embedding_dim: config.embedding.dimension,
        chunk_size: config.chunking.chunk_size,
        chunk_overlap: config.chunking.chunk_overlap,
    }
}

/// Open the store configured by `config`, or the snapshot at `snapshot`
/// when given explicitly.
///
/// The daemon keeps the whole store in memory and rewrites the snapshot on
/// every change, so commands that modify the store should be run while it
/// is stopped.
pub fn open_store(config: &Config, snapshot: Option<&Path>) -> CliResult<VectorStore> {
    let path = snapshot
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.snapshot_path());
    tracing::debug!("Opening snapshot at {}", path.display());
    Ok(VectorStore::open(path, store_settings(config))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_store_uses_explicit_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("elsewhere.json");

        let mut config = Config::default();
        config.embedding.dimension = 8;

        let store = open_store(&config, Some(&path)).unwrap();
        assert_eq!(store.path(), path.as_path());
        assert_eq!(store.embedding_dim(), 8);
        assert!(path.exists());
    }

    #[test]
    fn test_open_store_uses_configured_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = dir.path().to_path_buf();

        let store = open_store(&config, None).unwrap();
        assert_eq!(store.path(), dir.path().join("memory.json").as_path());
    }
}
