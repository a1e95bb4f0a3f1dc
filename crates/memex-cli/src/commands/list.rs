use clap::Parser;
use memex::memory::Chunk;
use memex::storage::{ChunkFilter, VectorStore};

use crate::error::CliResult;
use crate::output::{OutputFormat, format_timestamp, new_table, truncate_string};

#[derive(Parser)]
pub struct ListCommand {
    #[clap(
        long,
        short,
        default_value = "20",
        help = "Maximum number of chunks to display"
    )]
    pub limit: usize,

    #[clap(long, help = "Only chunks from this session")]
    pub session: Option<String>,

    #[clap(long, help = "Only chunks owned by this user")]
    pub user: Option<String>,
}

impl ListCommand {
    pub fn filter(&self) -> ChunkFilter {
        let mut filter = ChunkFilter::new();
        if let Some(session) = &self.session {
            filter = filter.with_session_id(session.as_str());
        }
        if let Some(user) = &self.user {
            filter = filter.with_user_id(user.as_str());
        }
        filter
    }

    /// Newest first; chunks of one ingestion stay in order.
    pub fn select<'a>(&self, store: &'a VectorStore) -> Vec<&'a Chunk> {
        let filter = self.filter();
        let mut chunks: Vec<&Chunk> = store.iter_matching(&filter).collect();
        chunks.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then(a.chunk_index.cmp(&b.chunk_index))
        });
        chunks.truncate(self.limit);
        chunks
    }

    pub fn execute(&self, store: &VectorStore, format: OutputFormat) -> CliResult<()> {
        let chunks = self.select(store);

        match format {
            OutputFormat::Json => {
                let output: Vec<_> = chunks
                    .iter()
                    .map(|c| {
                        serde_json::json!({
                            "id": c.id.to_string(),
                            "text": &c.text,
                            "source_type": &c.source_type,
                            "source_name": &c.source_name,
                            "session_id": &c.session_id,
                            "user_id": &c.user_id,
                            "chunk_index": c.chunk_index,
                            "total_chunks": c.total_chunks,
                            "timestamp": c.timestamp.to_rfc3339(),
                            "metadata": &c.metadata,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                if chunks.is_empty() {
                    println!("No chunks found.");
                    return Ok(());
                }

                let mut table = new_table(["ID", "Text", "Source", "Session", "User", "Chunk", "Stored"]);
                for chunk in &chunks {
                    table.add_row([
                        truncate_string(&chunk.id.to_string(), 8),
                        truncate_string(&chunk.text, 50),
                        format!("{}/{}", chunk.source_type, chunk.source_name),
                        chunk.session_id.clone(),
                        chunk.user_id.clone(),
                        format!("{}/{}", chunk.chunk_index + 1, chunk.total_chunks),
                        format_timestamp(&chunk.timestamp),
                    ]);
                }

                println!("{table}");
                println!("\nShowing {} of {} chunks", chunks.len(), store.len());
            }
        }

        Ok(())
    }
}
