use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use fieldops_engine::ResolutionMode;
use time::macros::format_description;
use time::Date;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "fieldops",
    version,
    about = "Aggregate field-service tickets and dispatch batch updates"
)]
pub struct Cli {
    /// Config file to use instead of $FIELDOPS_CONFIG or the default location.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Emit JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Tickets grouped by store with aging and duplicate flags.
    Stores(QueryArgs),
    /// Tickets grouped by scheduled date.
    Schedule(QueryArgs),
    /// Move tickets to a new scheduled date.
    Reschedule {
        #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_calendar_date)]
        date: Date,
        /// How to treat tickets already scheduled for another date.
        #[arg(long, value_enum)]
        on_conflict: Option<ConflictMode>,
        #[arg(required = true, value_name = "KEY")]
        keys: Vec<String>,
    },
    /// Move tickets to a workflow status.
    Transition {
        #[arg(long, value_name = "NAME")]
        status: String,
        #[arg(required = true, value_name = "KEY")]
        keys: Vec<String>,
    },
    /// Verify tracker connectivity and credentials.
    Check,
}

#[derive(Debug, Clone, Default, Args)]
pub struct QueryArgs {
    /// Saved query name from the config file. Repeatable.
    #[arg(long = "query", value_name = "NAME")]
    pub queries: Vec<String>,
    /// Ad hoc tracker query. Repeatable.
    #[arg(long = "jql", value_name = "JQL")]
    pub jql: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConflictMode {
    Abort,
    Overwrite,
    Skip,
}

impl From<ConflictMode> for ResolutionMode {
    fn from(mode: ConflictMode) -> Self {
        match mode {
            ConflictMode::Abort => Self::Abort,
            ConflictMode::Overwrite => Self::OverwriteAll,
            ConflictMode::Skip => Self::SkipConflicting,
        }
    }
}

fn parse_calendar_date(raw: &str) -> Result<Date, String> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|error| format!("expected YYYY-MM-DD: {error}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use time::macros::date;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_reschedule_with_conflict_mode() {
        let cli = Cli::try_parse_from([
            "fieldops",
            "--json",
            "reschedule",
            "--date",
            "2026-03-05",
            "--on-conflict",
            "skip",
            "FS-1",
            "FS-2",
        ])
        .expect("parse");

        assert!(cli.json);
        match cli.command {
            Command::Reschedule {
                date: parsed,
                on_conflict,
                keys,
            } => {
                assert_eq!(parsed, date!(2026 - 03 - 05));
                assert_eq!(on_conflict, Some(ConflictMode::Skip));
                assert_eq!(keys, vec!["FS-1", "FS-2"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_dates_and_missing_keys() {
        assert!(
            Cli::try_parse_from(["fieldops", "reschedule", "--date", "05/03/2026", "FS-1"]).is_err()
        );
        assert!(Cli::try_parse_from(["fieldops", "transition", "--status", "Scheduled"]).is_err());
    }

    #[test]
    fn query_flags_are_repeatable() {
        let cli = Cli::try_parse_from([
            "fieldops",
            "stores",
            "--query",
            "open",
            "--query",
            "mine",
            "--jql",
            "project = FS",
        ])
        .expect("parse");
        let Command::Stores(args) = cli.command else {
            panic!("expected stores command");
        };
        assert_eq!(args.queries, vec!["open", "mine"]);
        assert_eq!(args.jql, vec!["project = FS"]);
    }

    #[test]
    fn conflict_modes_map_to_resolution_modes() {
        assert_eq!(ResolutionMode::from(ConflictMode::Abort), ResolutionMode::Abort);
        assert_eq!(
            ResolutionMode::from(ConflictMode::Overwrite),
            ResolutionMode::OverwriteAll
        );
        assert_eq!(
            ResolutionMode::from(ConflictMode::Skip),
            ResolutionMode::SkipConflicting
        );
    }
}
