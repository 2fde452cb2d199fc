pub mod cli;
pub mod commands;
pub mod composition;
pub mod error;
pub mod render;

pub use cli::{Cli, Command, ConflictMode, QueryArgs};
pub use commands::{run_command, CommandOutcome};
pub use composition::{build_tracker_store, field_map, jira_config, AppContext};
pub use error::AppError;
