pub mod commands;
pub mod error;
pub mod output;
pub mod store;

pub use commands::{ClearCommand, ConfigCommand, ListCommand, StatsCommand};
pub use error::{CliError, CliResult};
pub use output::{OutputFormat, format_timestamp, truncate_string};
