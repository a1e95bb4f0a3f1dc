use std::collections::BTreeMap;

use clap::Parser;
use memex::storage::{ChunkFilter, VectorStore};

use crate::error::CliResult;
use crate::output::{OutputFormat, format_size, new_table};

#[derive(Parser)]
pub struct StatsCommand {
    #[clap(long, help = "Break the totals down per user and session")]
    pub by_session: bool,
}

/// Chunk count for one (user, session) pair
#[derive(Debug, PartialEq, Eq)]
pub struct SessionCount {
    pub user_id: String,
    pub session_id: String,
    pub chunks: usize,
}

pub fn session_counts(store: &VectorStore) -> Vec<SessionCount> {
    let all = ChunkFilter::new();
    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for chunk in store.iter_matching(&all) {
        *counts
            .entry((chunk.user_id.as_str(), chunk.session_id.as_str()))
            .or_default() += 1;
    }

    counts
        .into_iter()
        .map(|((user_id, session_id), chunks)| SessionCount {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            chunks,
        })
        .collect()
}

impl StatsCommand {
    pub fn execute(&self, store: &VectorStore, format: OutputFormat) -> CliResult<()> {
        let stats = store.stats();
        let snapshot_bytes = std::fs::metadata(store.path())?.len();
        let sessions = if self.by_session {
            session_counts(store)
        } else {
            Vec::new()
        };

        match format {
            OutputFormat::Json => {
                let mut output = serde_json::json!({
                    "total_chunks": stats.total_chunks,
                    "embedding_dim": stats.embedding_dim,
                    "chunk_size": stats.chunk_size,
                    "chunk_overlap": stats.chunk_overlap,
                    "snapshot_path": store.path().display().to_string(),
                    "snapshot_size_bytes": snapshot_bytes,
                });
                if self.by_session {
                    output["sessions"] = sessions
                        .iter()
                        .map(|s| {
                            serde_json::json!({
                                "user_id": s.user_id,
                                "session_id": s.session_id,
                                "chunks": s.chunks,
                            })
                        })
                        .collect();
                }
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                println!("Memex Statistics");
                println!("================\n");

                let mut table = new_table(["Property", "Value"]);
                table.add_row(["Total chunks", &stats.total_chunks.to_string()]);
                table.add_row(["Embedding dimension", &stats.embedding_dim.to_string()]);
                table.add_row(["Chunk size", &stats.chunk_size.to_string()]);
                table.add_row(["Chunk overlap", &stats.chunk_overlap.to_string()]);
                table.add_row(["Snapshot", &store.path().display().to_string()]);
                table.add_row(["Snapshot size", &format_size(snapshot_bytes)]);
                println!("{table}");

                if self.by_session {
                    if sessions.is_empty() {
                        println!("\nNo sessions stored.");
                    } else {
                        let mut table = new_table(["User", "Session", "Chunks"]);
                        for s in &sessions {
                            table.add_row([
                                s.user_id.clone(),
                                s.session_id.clone(),
                                s.chunks.to_string(),
                            ]);
                        }
                        println!("\n{table}");
                    }
                }
            }
        }

        Ok(())
    }
}
