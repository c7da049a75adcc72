use std::fs::{self, OpenOptions};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wl_api::{GitHubClient, SendGridNotifier, TogglClient};
use wl_cli::commands::export;
use wl_cli::commands::sync::{SyncAction, Syncer};
use wl_cli::{Cli, Commands, Config, ExportArgs, SyncArgs, dirs_state_path};

/// Installs the global subscriber.
///
/// `--verbose` wins over `RUST_LOG`, which wins over the configured level.
fn init_tracing(verbose: bool, config: &Config) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    if let Some(path) = &config.log_file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("failed to create log directory")?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        let _ = builder
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init();
    } else {
        let _ = builder.with_writer(std::io::stderr).try_init();
    }
    Ok(())
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    Config::load_from(config_path).context("failed to load configuration")
}

async fn run_sync(config: &Config, args: SyncArgs) -> Result<bool> {
    let timezone = config.timezone()?;
    let github = config.github()?;

    let source = TogglClient::new(config.toggl_api_token()?)?;
    let store = GitHubClient::new(github.token, github.repo, github.path)?
        .with_branch(github.branch.map(String::from));
    let notifier = config
        .notification()
        .map(|settings| SendGridNotifier::new(settings.api_key, settings.from, settings.to))
        .transpose()?;
    if notifier.is_none() {
        tracing::debug!("failure notifications disabled");
    }
    let syncer = Syncer::new(source, store, notifier, timezone);

    if args.dry_run {
        let report = syncer.sync_once(Utc::now(), true).await?;
        let verdict = match report.action {
            SyncAction::Created => "would create",
            SyncAction::Updated => "would update",
            SyncAction::Unchanged => "unchanged",
        };
        println!("{}", report.entry);
        println!("({verdict})");
        return Ok(true);
    }

    let lock_dir = dirs_state_path().context("could not determine state directory")?;
    if args.schedule {
        syncer
            .run_scheduled(config.sync_interval()?, &lock_dir)
            .await?;
        return Ok(true);
    }
    Ok(syncer.run_locked_cycle(&lock_dir, Utc::now()).await)
}

async fn run_export(config: &Config, args: &ExportArgs) -> Result<()> {
    let source = TogglClient::new(config.toggl_api_token()?)?;
    export::run(
        &source,
        config.timezone()?,
        args.start,
        args.end,
        &args.output,
        Utc::now(),
    )
    .await
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(ExitCode::SUCCESS);
    };

    let config = load_config(cli.config.as_deref())?;
    init_tracing(cli.verbose, &config)?;
    tracing::debug!(?config, "loaded configuration");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    match command {
        Commands::Sync(args) => {
            if !runtime.block_on(run_sync(&config, *args))? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Export(args) => runtime.block_on(run_export(&config, args))?,
    }

    Ok(ExitCode::SUCCESS)
}
