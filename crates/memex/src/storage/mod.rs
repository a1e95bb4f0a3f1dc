pub mod filter;
pub mod snapshot;
pub mod vector_store;

pub use filter::ChunkFilter;
pub use snapshot::{SNAPSHOT_VERSION, SnapshotHeader};
pub use vector_store::{ScoredChunk, StoreSettings, StoreStats, VectorStore, cosine_similarity};
