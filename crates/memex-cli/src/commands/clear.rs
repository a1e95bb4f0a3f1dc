use clap::Parser;
use memex::storage::{ChunkFilter, VectorStore};

use crate::error::{CliError, CliResult};
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct ClearCommand {
    #[clap(long, help = "Clear chunks from this session")]
    pub session: Option<String>,

    #[clap(long, help = "Clear chunks owned by this user")]
    pub user: Option<String>,

    #[clap(
        long,
        help = "Clear every stored chunk",
        conflicts_with_all = ["session", "user"]
    )]
    pub all: bool,
}

impl ClearCommand {
    /// Scope to delete. Refuses an unscoped clear unless `--all` was given.
    pub fn filter(&self) -> CliResult<ChunkFilter> {
        if self.all {
            return Ok(ChunkFilter::new());
        }
        if self.session.is_none() && self.user.is_none() {
            return Err(CliError::from(
                "Nothing to clear: pass --session, --user, or --all",
            ));
        }

        let mut filter = ChunkFilter::new();
        if let Some(session) = &self.session {
            if session.trim().is_empty() {
                return Err(CliError::from("--session must not be empty"));
            }
            filter = filter.with_session_id(session.as_str());
        }
        if let Some(user) = &self.user {
            if user.trim().is_empty() {
                return Err(CliError::from("--user must not be empty"));
            }
            filter = filter.with_user_id(user.as_str());
        }
        Ok(filter)
    }

    pub fn execute(&self, store: &mut VectorStore, format: OutputFormat) -> CliResult<()> {
        let filter = self.filter()?;
        let cleared = store.delete_where(&filter)?;
        tracing::info!("Cleared {} chunks", cleared);

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "cleared_count": cleared,
                    "remaining": store.len(),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                println!("Cleared {cleared} chunks ({} remaining).", store.len());
            }
        }

        Ok(())
    }
}
