// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! autorename: sequential renaming of images dropped into watched folders

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use autorename::config::{EngineSettings, NamingOrder};
use autorename::coordinator::{MonitorCoordinator, SessionReport};
use autorename::journal::RenameJournal;
use autorename::session::{SessionRequest, WatchTarget};
use autorename::worker::{SessionEvent, WorkerOutcome};
use autorename::{AutoRenameError, Result};

/// autorename CLI - sequential image renamer
#[derive(Parser, Debug)]
#[command(name = "autorename")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version = "1.0.0")]
#[command(about = "Renames images dropped into watched folders from an ordered name list", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the naming order file (JSON array)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch subdirectories of a working folder and rename new images
    Watch {
        /// Working folder holding the subdirectories
        #[arg(short, long)]
        root: PathBuf,

        /// Subdirectory to watch (repeat for several)
        #[arg(short, long = "dir", required = true)]
        dirs: Vec<String>,

        /// Naming order to use and save (repeat, in order); defaults to the saved one
        #[arg(short, long = "name")]
        names: Vec<String>,

        /// Delay before a new file is renamed, in milliseconds
        #[arg(long, default_value = "500")]
        settle_ms: u64,

        /// Image extensions to accept (repeat); defaults to jpg, jpeg, png
        #[arg(long = "ext")]
        extensions: Vec<String>,

        /// Do not clear the working folder before starting
        #[arg(long)]
        keep_existing: bool,

        /// Journal file for completed renames
        #[arg(long, default_value = "autorename_journal.jsonl")]
        journal: PathBuf,
    },

    /// Manage the saved naming order
    Names {
        #[command(subcommand)]
        action: NamesCommands,
    },

    /// Inspect the rename journal
    Journal {
        /// Journal file
        #[arg(long, default_value = "autorename_journal.jsonl")]
        file: PathBuf,

        #[command(subcommand)]
        action: JournalCommands,
    },
}

#[derive(Subcommand, Debug)]
enum NamesCommands {
    /// Show the saved naming order
    Show,

    /// Replace the saved naming order
    Set {
        /// Names, in assignment order
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Save an empty naming order
    Clear,
}

#[derive(Subcommand, Debug)]
enum JournalCommands {
    /// List recent renames
    List {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,

        /// Only renames in this directory (full path or subdirectory name)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Show how many renames each directory has had
    Summary,

    /// Delete the journal
    Clear {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Watch {
            root,
            dirs,
            names,
            settle_ms,
            extensions,
            keep_existing,
            journal,
        } => {
            let mut settings = EngineSettings {
                stabilization_delay: Duration::from_millis(settle_ms),
                ..EngineSettings::default()
            };
            if !extensions.is_empty() {
                settings.image_extensions = extensions;
            }
            run_watch(&cli.config, root, dirs, names, settings, keep_existing, journal).await
        }
        Commands::Names { action } => run_names_command(&cli.config, action),
        Commands::Journal { file, action } => run_journal_command(file, action),
    }
}

/// Load the saved naming order, treating an unreadable file as unconfigured
fn load_naming_order(path: &Path) -> Option<NamingOrder> {
    match NamingOrder::load(path) {
        Ok(order) => order,
        Err(e) => {
            warn!("Ignoring naming order at {:?}: {}", path, e);
            None
        }
    }
}

/// Run a monitoring session until every directory is done or Ctrl+C
async fn run_watch(
    config_path: &Path,
    root: PathBuf,
    dirs: Vec<String>,
    names: Vec<String>,
    settings: EngineSettings,
    keep_existing: bool,
    journal_path: PathBuf,
) -> Result<()> {
    let naming_order = if names.is_empty() {
        load_naming_order(config_path).ok_or_else(|| {
            AutoRenameError::Config(format!(
                "No naming order configured. Pass --name or run: autorename names set ... (config: {:?})",
                config_path
            ))
        })?
    } else {
        NamingOrder::new(names)
    };

    let request = SessionRequest::new(root, dirs, naming_order);
    let targets = prepare_session(config_path, &request, !keep_existing)?;
    info!("Watch directories: {:?}", targets.iter().map(|t| t.resolved()).collect::<Vec<_>>());
    info!("Naming order: {:?}", request.naming_order.names());

    let coordinator = MonitorCoordinator::new(settings);
    let mut handle = coordinator.start(targets, &request.naming_order);
    let mut events = handle.take_events().unwrap_or_else(|| handle.subscribe());
    let journal = RenameJournal::new(journal_path);

    info!("Renaming active. Press Ctrl+C to stop.");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let report = loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Stopping session...");
                break handle.shutdown().await?;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    record_event(&journal, &event);
                    if let SessionEvent::WorkerFinished { .. } = event {
                        if let Some(report) = handle.poll_completion() {
                            break report;
                        }
                    }
                }
                Err(RecvError::Lagged(missed)) => warn!("Missed {} progress events", missed),
                Err(RecvError::Closed) => break handle.wait().await?,
            },
            _ = tokio::time::sleep(Duration::from_millis(250)) => {
                if let Some(report) = handle.poll_completion() {
                    break report;
                }
            }
        }
    };

    print_summary(&report);
    Ok(())
}

/// Validate, clear the working folder, then commit the order the session
/// runs with. Saving last keeps a config file inside the root alive.
fn prepare_session(config_path: &Path, request: &SessionRequest, clear_existing: bool) -> Result<Vec<WatchTarget>> {
    let targets = request.prepare_workspace(clear_existing)?;

    if let Err(e) = request.naming_order.save(config_path) {
        warn!("Could not save naming order to {:?}: {}", config_path, e);
    }

    Ok(targets)
}

/// Log a progress event and journal completed renames
fn record_event(journal: &RenameJournal, event: &SessionEvent) {
    if let Err(e) = journal.record(event) {
        warn!("Failed to write journal entry: {}", e);
    }

    match event {
        SessionEvent::Renamed { .. } => {}
        SessionEvent::RenameFailed { path, name, error: e, .. } => {
            error!("{:?} could not take name '{}': {}", path, name, e);
        }
        SessionEvent::Skipped { path, reason, .. } => {
            debug!("Skipped {:?}: {:?}", path, reason);
        }
        SessionEvent::WatchError { target, message } => {
            warn!("{}: {}", target, message);
        }
        SessionEvent::WorkerFinished { target, outcome } => {
            info!("{} finished: {:?}", target, outcome);
        }
    }
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}

fn print_summary(report: &SessionReport) {
    println!("Session finished: {} file(s) renamed", report.renamed_total());
    for (target, outcome) in &report.outcomes {
        let status = match outcome {
            WorkerOutcome::Exhausted { renamed } => format!("done ({} renamed)", renamed),
            WorkerOutcome::Cancelled { renamed } => format!("stopped ({} renamed)", renamed),
            WorkerOutcome::StreamClosed { renamed } => format!("watch closed ({} renamed)", renamed),
            WorkerOutcome::WatchFailed { error } => format!("not watched: {}", error),
            WorkerOutcome::Panicked { error } => format!("crashed: {}", error),
        };
        println!("  {}: {}", target, status);
    }
}

/// Run naming order commands
fn run_names_command(config_path: &Path, action: NamesCommands) -> Result<()> {
    match action {
        NamesCommands::Show => match load_naming_order(config_path) {
            Some(order) if !order.is_empty() => {
                println!("Naming order ({} names):", order.len());
                for (i, name) in order.names().iter().enumerate() {
                    println!("  {:3}. {}", i + 1, name);
                }
            }
            Some(_) => println!("Naming order is empty"),
            None => println!("No naming order configured"),
        },
        NamesCommands::Set { names } => {
            if let Some(pos) = names.iter().position(|n| n.trim().is_empty()) {
                return Err(AutoRenameError::Validation(format!(
                    "naming order entry {} is empty",
                    pos + 1
                )));
            }
            let order = NamingOrder::new(names);
            order.save(config_path)?;
            println!("Saved {} names to {:?}", order.len(), config_path);
        }
        NamesCommands::Clear => {
            NamingOrder::default().save(config_path)?;
            println!("Naming order cleared");
        }
    }

    Ok(())
}

/// Run journal commands
fn run_journal_command(file: PathBuf, action: JournalCommands) -> Result<()> {
    let journal = RenameJournal::new(file);

    match action {
        JournalCommands::List { count, dir } => {
            let entries = journal.recent(count, dir.as_deref())?;
            match &dir {
                Some(dir) => println!("Recent renames in {} ({} entries):", dir.display(), entries.len()),
                None => println!("Recent renames ({} entries):", entries.len()),
            }
            for entry in entries {
                println!(
                    "  {} {} -> {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.original_path.display(),
                    entry.new_path.display()
                );
            }
        }
        JournalCommands::Summary => {
            let counts = journal.counts_by_directory()?;
            if counts.is_empty() {
                println!("No renames journaled");
            }
            for (directory, count) in counts {
                println!("  {}: {} renamed", directory.display(), count);
            }
        }
        JournalCommands::Clear { force } => {
            if !force {
                eprintln!("Use --force to confirm clearing the journal");
                return Ok(());
            }
            journal.clear()?;
            println!("Journal cleared");
        }
    }

    Ok(())
}
