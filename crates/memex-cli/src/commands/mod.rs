pub mod clear;
pub mod config;
pub mod list;
pub mod stats;

pub use clear::ClearCommand;
pub use config::ConfigCommand;
pub use list::ListCommand;
pub use stats::StatsCommand;
