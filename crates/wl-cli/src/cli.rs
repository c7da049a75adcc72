//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

/// Keeps today's worklog entry in sync with Toggl Track.
///
/// Totals the day's tracked time and writes it as a single line into a
/// worklog file in a GitHub repository, preserving everything else.
#[derive(Debug, Parser)]
#[command(name = "wl", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Reconcile today's worklog entry with tracked time.
    Sync(SyncArgs),

    /// Export completed time records to CSV.
    Export(ExportArgs),
}

#[derive(Debug, Clone, Copy, Args)]
pub struct SyncArgs {
    /// Show the entry that would be written without writing it.
    #[arg(long, conflicts_with = "schedule")]
    pub dry_run: bool,

    /// Keep running, syncing every `sync_interval_minutes` until Ctrl-C.
    #[arg(long)]
    pub schedule: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    /// CSV file to write.
    #[arg(short, long)]
    pub output: PathBuf,

    /// First day to export (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last day to export, inclusive (YYYY-MM-DD). Defaults to the start day.
    #[arg(long)]
    pub end: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_sync_flags() {
        let cli = Cli::try_parse_from(["wl", "-v", "sync", "--dry-run"]).unwrap();
        assert!(cli.verbose);
        let Some(Commands::Sync(args)) = cli.command else {
            panic!("expected sync command");
        };
        assert!(args.dry_run);
        assert!(!args.schedule);
    }

    #[test]
    fn dry_run_conflicts_with_schedule() {
        assert!(Cli::try_parse_from(["wl", "sync", "--dry-run", "--schedule"]).is_err());
    }

    #[test]
    fn parses_export_dates() {
        let cli = Cli::try_parse_from([
            "wl",
            "export",
            "--output",
            "out.csv",
            "--start",
            "2025-04-07",
            "--end",
            "2025-04-09",
        ])
        .unwrap();
        let Some(Commands::Export(args)) = cli.command else {
            panic!("expected export command");
        };
        assert_eq!(args.output, PathBuf::from("out.csv"));
        assert_eq!(args.start, NaiveDate::from_ymd_opt(2025, 4, 7));
        assert_eq!(args.end, NaiveDate::from_ymd_opt(2025, 4, 9));
    }

    #[test]
    fn export_requires_output() {
        assert!(Cli::try_parse_from(["wl", "export"]).is_err());
    }
}
