//! In-memory vector index backed by a JSON snapshot
//!
//! All chunks live in insertion order in a `Vec`. Every mutation rewrites the
//! snapshot before it is reported as successful; a failed write leaves the
//! in-memory index exactly as it was.
//!
//! Search is a linear cosine scan, O(n·d) per query. The public operations
//! (`store`, `store_batch`, `query`, `delete_where`, `stats`) are the seam
//! at which an approximate index could replace the scan.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use uuid::Uuid;

use crate::error::{MemexError, Result};
use crate::memory::types::Chunk;
use crate::storage::filter::ChunkFilter;
use crate::storage::snapshot::{self, SnapshotHeader};

/// Store-wide settings fixed when the store is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    pub embedding_dim: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl From<StoreSettings> for SnapshotHeader {
    fn from(settings: StoreSettings) -> Self {
        SnapshotHeader {
            embedding_dim: settings.embedding_dim,
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
        }
    }
}

/// A stored chunk paired with its raw cosine similarity to a query
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity in [-1, 1]
    pub similarity: f32,
}

/// Aggregate view of the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total_chunks: usize,
    pub embedding_dim: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

/// Owned vector store with an explicit open/flush lifecycle.
#[derive(Debug)]
pub struct VectorStore {
    path: PathBuf,
    settings: StoreSettings,
    chunks: Vec<Chunk>,
    ids: HashSet<Uuid>,
}

impl VectorStore {
    /// Open the store at `path`, loading the snapshot if one exists.
    ///
    /// A missing snapshot starts an empty store and writes an initial
    /// document. An unreadable snapshot, or one recorded with a different
    /// embedding dimension, is an error rather than an empty start.
    pub fn open(path: impl AsRef<Path>, settings: StoreSettings) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if settings.embedding_dim == 0 {
            return Err(MemexError::Validation(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemexError::Storage(format!(
                    "Failed to create data directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let Some(loaded) = snapshot::read(&path)? else {
            let store = Self {
                path,
                settings,
                chunks: Vec::new(),
                ids: HashSet::new(),
            };
            store.flush()?;
            tracing::info!("Created empty memory store at {}", store.path.display());
            return Ok(store);
        };

        let header = loaded.header;
        if header.embedding_dim != settings.embedding_dim {
            return Err(MemexError::Storage(format!(
                "Snapshot {} holds {}-dimensional vectors but the embedder produces {}",
                path.display(),
                header.embedding_dim,
                settings.embedding_dim
            )));
        }
        if header.chunk_size != settings.chunk_size || header.chunk_overlap != settings.chunk_overlap
        {
            tracing::warn!(
                "Snapshot was written with chunking {}/{}, using configured {}/{} for new ingestions",
                header.chunk_size,
                header.chunk_overlap,
                settings.chunk_size,
                settings.chunk_overlap
            );
        }

        let mut ids = HashSet::with_capacity(loaded.chunks.len());
        for chunk in &loaded.chunks {
            validate_chunk(chunk, settings.embedding_dim)
                .map_err(|e| MemexError::Storage(format!("Corrupt snapshot: {e}")))?;
            if !ids.insert(chunk.id) {
                return Err(MemexError::Storage(format!(
                    "Corrupt snapshot: duplicate chunk id {}",
                    chunk.id
                )));
            }
        }

        tracing::info!(
            "Loaded {} chunks from {}",
            loaded.chunks.len(),
            path.display()
        );

        Ok(Self {
            path,
            settings,
            chunks: loaded.chunks,
            ids,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> StoreSettings {
        self.settings
    }

    pub fn embedding_dim(&self) -> usize {
        self.settings.embedding_dim
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Chunk> {
        self.chunks.iter().find(|chunk| chunk.id == id)
    }

    /// Chunks matching `filter`, in insertion order
    pub fn iter_matching<'a, 'f>(&'a self, filter: &'f ChunkFilter) -> impl Iterator<Item = &'a Chunk> + use<'a, 'f> {
        self.chunks.iter().filter(move |chunk| filter.matches(chunk))
    }

    /// Store a single chunk
    pub fn store(&mut self, chunk: Chunk) -> Result<Uuid> {
        let mut ids = self.store_batch(vec![chunk])?;
        ids.pop()
            .ok_or_else(|| MemexError::Storage("store produced no id".to_string()))
    }

    /// Store all of `chunks` or none of them.
    pub fn store_batch(&mut self, chunks: Vec<Chunk>) -> Result<Vec<Uuid>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let mut batch_ids = HashSet::with_capacity(chunks.len());
        for chunk in &chunks {
            validate_chunk(chunk, self.settings.embedding_dim)?;
            if self.ids.contains(&chunk.id) || !batch_ids.insert(chunk.id) {
                return Err(MemexError::Validation(format!(
                    "chunk id {} already exists",
                    chunk.id
                )));
            }
        }

        let ids: Vec<Uuid> = chunks.iter().map(|chunk| chunk.id).collect();
        let previous_len = self.chunks.len();
        self.chunks.extend(chunks);

        if let Err(e) = snapshot::write(&self.path, self.settings.into(), &self.chunks) {
            self.chunks.truncate(previous_len);
            tracing::error!("Failed to persist {} chunks, rolled back: {}", ids.len(), e);
            return Err(e);
        }

        self.ids.extend(ids.iter().copied());
        tracing::debug!("Stored {} chunks ({} total)", ids.len(), self.chunks.len());
        Ok(ids)
    }

    /// Rank chunks matching `filter` by cosine similarity to `vector`.
    ///
    /// Results are sorted descending; equal scores keep insertion order.
    pub fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &ChunkFilter,
    ) -> Result<Vec<ScoredChunk>> {
        if vector.len() != self.settings.embedding_dim {
            return Err(MemexError::Validation(format!(
                "query vector has dimension {} but the store holds {}",
                vector.len(),
                self.settings.embedding_dim
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(MemexError::Validation(
                "query vector contains non-finite values".to_string(),
            ));
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .chunks
            .iter()
            .enumerate()
            .filter(|(_, chunk)| filter.matches(chunk))
            .map(|(idx, chunk)| (idx, cosine_similarity(vector, &chunk.vector)))
            .collect();

        // Stable sort keeps insertion order for equal scores
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(idx, similarity)| ScoredChunk {
                chunk: self.chunks[idx].clone(),
                similarity,
            })
            .collect())
    }

    /// Remove every chunk matching `filter`, returning how many were removed.
    ///
    /// The retained set is persisted before it replaces the in-memory index.
    pub fn delete_where(&mut self, filter: &ChunkFilter) -> Result<usize> {
        let removed = self.chunks.iter().filter(|chunk| filter.matches(chunk)).count();
        if removed == 0 {
            return Ok(0);
        }

        let retained: Vec<Chunk> = self
            .chunks
            .iter()
            .filter(|chunk| !filter.matches(chunk))
            .cloned()
            .collect();

        snapshot::write(&self.path, self.settings.into(), &retained)?;

        self.ids = retained.iter().map(|chunk| chunk.id).collect();
        self.chunks = retained;
        tracing::info!("Deleted {} chunks ({} remain)", removed, self.chunks.len());
        Ok(removed)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            total_chunks: self.chunks.len(),
            embedding_dim: self.settings.embedding_dim,
            chunk_size: self.settings.chunk_size,
            chunk_overlap: self.settings.chunk_overlap,
        }
    }

    /// Write the current index to the snapshot.
    pub fn flush(&self) -> Result<()> {
        snapshot::write(&self.path, self.settings.into(), &self.chunks)
    }
}

fn validate_chunk(chunk: &Chunk, embedding_dim: usize) -> Result<()> {
    if chunk.vector.len() != embedding_dim {
        return Err(MemexError::Validation(format!(
            "chunk {} has dimension {} but the store holds {}",
            chunk.id,
            chunk.vector.len(),
            embedding_dim
        )));
    }
    if chunk.vector.iter().any(|v| !v.is_finite()) {
        return Err(MemexError::Validation(format!(
            "chunk {} vector contains non-finite values",
            chunk.id
        )));
    }
    if chunk.chunk_index >= chunk.total_chunks {
        return Err(MemexError::Validation(format!(
            "chunk {} has index {} but total_chunks is {}",
            chunk.id, chunk.chunk_index, chunk.total_chunks
        )));
    }
    Ok(())
}

/// Cosine similarity clamped to [-1, 1]. Mismatched, empty or zero-norm
/// vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    // Accumulate in f64 so large finite components cannot overflow
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }

    let cosine = dot / denom;
    if cosine.is_nan() {
        return 0.0;
    }
    cosine.clamp(-1.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::chunk_fixture;

    const SETTINGS: StoreSettings = StoreSettings {
        embedding_dim: 2,
        chunk_size: 512,
        chunk_overlap: 50,
    };

    fn open_temp() -> (tempfile::TempDir, VectorStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path().join("memory.json"), SETTINGS).unwrap();
        (dir, store)
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_cosine_similarity_with_large_components() {
        let similarity = cosine_similarity(&[1e20, 1e20], &[1e20, 0.0]);
        assert!(similarity.is_finite());
        assert!((similarity - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);

        let huge = cosine_similarity(&[f32::MAX, f32::MAX], &[f32::MAX, f32::MAX]);
        assert!((huge - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_query_ranks_large_vectors_without_nan() {
        let (_dir, mut store) = open_temp();
        store.store(chunk_fixture("aligned", vec![1e20, 0.0])).unwrap();
        store.store(chunk_fixture("diagonal", vec![1e20, 1e20])).unwrap();

        let results = store.query(&[1e20, 0.0], 2, &ChunkFilter::new()).unwrap();
        assert_eq!(results[0].chunk.text, "aligned");
        assert!(results.iter().all(|r| r.similarity.is_finite()));
    }

    #[test]
    fn test_open_creates_snapshot() {
        let (dir, store) = open_temp();
        assert!(store.is_empty());
        assert!(dir.path().join("memory.json").exists());
        assert_eq!(
            store.stats(),
            StoreStats {
                total_chunks: 0,
                embedding_dim: 2,
                chunk_size: 512,
                chunk_overlap: 50,
            }
        );
    }

    #[test]
    fn test_open_rejects_zero_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let settings = StoreSettings {
            embedding_dim: 0,
            ..SETTINGS
        };
        assert!(VectorStore::open(dir.path().join("memory.json"), settings).is_err());
    }

    #[test]
    fn test_store_and_query_ranks_by_similarity() {
        let (_dir, mut store) = open_temp();
        store.store(chunk_fixture("east", vec![1.0, 0.0])).unwrap();
        store.store(chunk_fixture("north", vec![0.0, 1.0])).unwrap();
        store.store(chunk_fixture("north-east", vec![1.0, 1.0])).unwrap();

        let results = store.query(&[1.0, 0.0], 10, &ChunkFilter::new()).unwrap();
        let texts: Vec<&str> = results.iter().map(|r| r.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["east", "north-east", "north"]);
        assert!((results[0].similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_query_ties_keep_insertion_order() {
        let (_dir, mut store) = open_temp();
        for name in ["first", "second", "third"] {
            store.store(chunk_fixture(name, vec![0.5, 0.5])).unwrap();
        }

        let results = store.query(&[1.0, 1.0], 2, &ChunkFilter::new()).unwrap();
        let texts: Vec<&str> = results.iter().map(|r| r.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn test_query_applies_filter() {
        let (_dir, mut store) = open_temp();
        let mut other = chunk_fixture("other session", vec![1.0, 0.0]);
        other.session_id = "s2".to_string();
        store.store(other).unwrap();
        store.store(chunk_fixture("mine", vec![0.0, 1.0])).unwrap();

        let filter = ChunkFilter::new().with_session_id("s1");
        let results = store.query(&[1.0, 0.0], 10, &filter).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.text, "mine");
    }

    #[test]
    fn test_query_rejects_wrong_dimension() {
        let (_dir, store) = open_temp();
        let err = store.query(&[1.0, 0.0, 0.0], 5, &ChunkFilter::new()).unwrap_err();
        assert!(matches!(err, MemexError::Validation(_)));
    }

    #[test]
    fn test_store_rejects_invalid_chunks() {
        let (_dir, mut store) = open_temp();

        let wrong_dim = chunk_fixture("bad", vec![1.0, 0.0, 0.0]);
        assert!(store.store(wrong_dim).is_err());

        let mut bad_index = chunk_fixture("bad", vec![1.0, 0.0]);
        bad_index.chunk_index = 1;
        bad_index.total_chunks = 1;
        assert!(store.store(bad_index).is_err());

        let chunk = chunk_fixture("dup", vec![1.0, 0.0]);
        store.store(chunk.clone()).unwrap();
        assert!(store.store(chunk).is_err());

        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_batch_is_all_or_nothing() {
        let (_dir, mut store) = open_temp();
        let good = chunk_fixture("good", vec![1.0, 0.0]);
        let bad = chunk_fixture("bad", vec![1.0]);

        assert!(store.store_batch(vec![good, bad]).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_failed_persist_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let mut store = VectorStore::open(data_dir.join("memory.json"), SETTINGS).unwrap();
        store.store(chunk_fixture("kept", vec![1.0, 0.0])).unwrap();

        // Removing the directory makes the next snapshot write fail
        std::fs::remove_dir_all(&data_dir).unwrap();

        let chunk = chunk_fixture("lost", vec![0.0, 1.0]);
        let id = chunk.id;
        let err = store.store(chunk).unwrap_err();
        assert!(matches!(err, MemexError::Storage(_)));
        assert_eq!(store.len(), 1);
        assert!(store.get(id).is_none());

        let err = store.delete_where(&ChunkFilter::new()).unwrap_err();
        assert!(matches!(err, MemexError::Storage(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete_where() {
        let (_dir, mut store) = open_temp();
        let mut other = chunk_fixture("other", vec![1.0, 0.0]);
        other.session_id = "s2".to_string();
        store.store(other).unwrap();
        store.store(chunk_fixture("mine", vec![1.0, 0.0])).unwrap();

        let removed = store
            .delete_where(&ChunkFilter::new().with_session_id("s2"))
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);

        let removed = store
            .delete_where(&ChunkFilter::new().with_session_id("nobody"))
            .unwrap();
        assert_eq!(removed, 0);

        let removed = store.delete_where(&ChunkFilter::new()).unwrap();
        assert_eq!(removed, 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_reopen_restores_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let chunk = chunk_fixture("persisted", vec![0.6, 0.8]);
        let id = chunk.id;

        {
            let mut store = VectorStore::open(&path, SETTINGS).unwrap();
            store.store(chunk.clone()).unwrap();
            store.flush().unwrap();
        }

        let store = VectorStore::open(&path, SETTINGS).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(id), Some(&chunk));
    }

    #[test]
    fn test_reopen_with_other_dimension_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        VectorStore::open(&path, SETTINGS).unwrap();

        let settings = StoreSettings {
            embedding_dim: 3,
            ..SETTINGS
        };
        let err = VectorStore::open(&path, settings).unwrap_err();
        assert!(matches!(err, MemexError::Storage(_)));
    }

    #[test]
    fn test_reopen_with_other_chunking_adopts_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        VectorStore::open(&path, SETTINGS).unwrap();

        let settings = StoreSettings {
            chunk_size: 256,
            chunk_overlap: 10,
            ..SETTINGS
        };
        let store = VectorStore::open(&path, settings).unwrap();
        assert_eq!(store.stats().chunk_size, 256);
        assert_eq!(store.stats().chunk_overlap, 10);
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        std::fs::write(&path, "not a snapshot").unwrap();

        assert!(matches!(
            VectorStore::open(&path, SETTINGS),
            Err(MemexError::Storage(_))
        ));
    }
}
