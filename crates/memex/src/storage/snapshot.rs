//! Durable snapshot format
//!
//! The whole store is persisted as one versioned JSON document:
//!
//! ```json
//! {"version": 1, "embedding_dim": 384, "chunk_size": 512, "chunk_overlap": 50, "chunks": [...]}
//! ```
//!
//! Writes go to a temporary file in the same directory which is synced and
//! then renamed over the previous snapshot, so readers only ever observe a
//! complete document.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{MemexError, Result};
use crate::memory::types::Chunk;

/// Current snapshot schema version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Store-wide settings recorded alongside the chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub embedding_dim: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    #[serde(flatten)]
    header: SnapshotHeader,
    chunks: &'a [Chunk],
}

/// A snapshot as read back from disk
#[derive(Debug, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    #[serde(flatten)]
    pub header: SnapshotHeader,
    pub chunks: Vec<Chunk>,
}

/// Read the snapshot at `path`. Returns `Ok(None)` when no snapshot exists.
pub fn read(path: &Path) -> Result<Option<Snapshot>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(MemexError::Storage(format!(
                "Failed to open snapshot {}: {e}",
                path.display()
            )));
        }
    };

    let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        MemexError::Storage(format!("Failed to parse snapshot {}: {e}", path.display()))
    })?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(MemexError::Storage(format!(
            "Unsupported snapshot version {} in {} (expected {SNAPSHOT_VERSION})",
            snapshot.version,
            path.display()
        )));
    }

    Ok(Some(snapshot))
}

/// Atomically replace the snapshot at `path`.
pub fn write(path: &Path, header: SnapshotHeader, chunks: &[Chunk]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| {
        MemexError::Storage(format!(
            "Failed to create temporary snapshot in {}: {e}",
            dir.display()
        ))
    })?;

    let document = SnapshotRef {
        version: SNAPSHOT_VERSION,
        header,
        chunks,
    };

    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer(&mut writer, &document)
            .map_err(|e| MemexError::Serialization(format!("Failed to encode snapshot: {e}")))?;
        writer
            .flush()
            .map_err(|e| MemexError::Storage(format!("Failed to write snapshot: {e}")))?;
    }

    tmp.as_file()
        .sync_all()
        .map_err(|e| MemexError::Storage(format!("Failed to sync snapshot: {e}")))?;

    tmp.persist(path).map_err(|e| {
        MemexError::Storage(format!(
            "Failed to replace snapshot {}: {}",
            path.display(),
            e.error
        ))
    })?;

    tracing::debug!("Saved {} chunks to {}", chunks.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::chunk_fixture;

    const HEADER: SnapshotHeader = SnapshotHeader {
        embedding_dim: 2,
        chunk_size: 512,
        chunk_overlap: 50,
    };

    #[test]
    fn test_missing_snapshot_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let result = read(&dir.path().join("memory.json")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let chunks = vec![
            chunk_fixture("first", vec![1.0, 0.0]),
            chunk_fixture("second", vec![0.0, 1.0]),
        ];

        write(&path, HEADER, &chunks).unwrap();
        let snapshot = read(&path).unwrap().unwrap();

        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.header, HEADER);
        assert_eq!(snapshot.chunks, chunks);
    }

    #[test]
    fn test_document_layout_is_flat() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        write(&path, HEADER, &[]).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["embedding_dim"], 2);
        assert_eq!(raw["chunk_size"], 512);
        assert_eq!(raw["chunk_overlap"], 50);
        assert!(raw["chunks"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_rejects_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        std::fs::write(
            &path,
            r#"{"version": 99, "embedding_dim": 2, "chunk_size": 512, "chunk_overlap": 50, "chunks": []}"#,
        )
        .unwrap();

        let err = read(&path).unwrap_err();
        assert!(err.to_string().contains("Unsupported snapshot version 99"));
    }

    #[test]
    fn test_rejects_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(read(&path), Err(MemexError::Storage(_))));
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("memory.json");
        assert!(matches!(write(&path, HEADER, &[]), Err(MemexError::Storage(_))));
    }
}
