//! Sync CLI commands
//!
//! Configure the shared remote and run or inspect sync cycles.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Subcommand;

use crate::config::{Settings, SyncMode};
use crate::error::{LedgerError, LedgerResult};
use crate::storage::Storage;
use crate::sync::{SyncOrchestrator, SyncOutcome, SyncReport};

/// Sync subcommands
#[derive(Subcommand)]
pub enum SyncCommands {
    /// Run one sync cycle now
    Run,
    /// Show sync configuration and last sync time
    Status,
    /// Sync through a local or mounted directory
    EnableLocal {
        /// Sync root directory (e.g., a cloud drive folder)
        root: PathBuf,
        /// Directory under the root holding this ledger
        #[arg(long)]
        remote_dir: Option<String>,
        /// Treat an unreadable remote snapshot as absent
        #[arg(long)]
        tolerate_corrupt: bool,
    },
    /// Turn sync off
    Disable,
    /// List ledgers present on the remote
    Remotes,
}

/// Handle a sync command
pub async fn handle_sync_command(
    storage: Arc<Storage>,
    mut settings: Settings,
    cmd: SyncCommands,
) -> LedgerResult<()> {
    match cmd {
        SyncCommands::Run => {
            let orchestrator = SyncOrchestrator::from_settings(storage, settings)?;
            let outcome = tokio::task::spawn_blocking(move || orchestrator.run_cycle())
                .await
                .map_err(|e| LedgerError::Io(format!("Sync task failed: {}", e)))??;

            match outcome {
                SyncOutcome::Disabled => {
                    println!("Sync is disabled. Run 'envelope sync enable-local <dir>' first.")
                }
                SyncOutcome::AlreadyRunning => println!("A sync is already running."),
                SyncOutcome::Completed(report) => print_report(&report),
            }
        }

        SyncCommands::Status => {
            let sync = &settings.sync;
            println!("Sync Status");
            println!("===========");
            match &sync.mode {
                SyncMode::Disabled => println!("Mode:        disabled"),
                SyncMode::Local { root } => {
                    println!("Mode:        local directory");
                    println!("Root:        {}", root.display());
                }
            }
            println!("Snapshot:    {}", sync.snapshot_path());
            println!("Debounce:    {}s", sync.debounce_secs);
            println!(
                "Last synced: {}",
                sync.last_synced_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| "never".to_string())
            );
        }

        SyncCommands::EnableLocal {
            root,
            remote_dir,
            tolerate_corrupt,
        } => {
            settings.sync.mode = SyncMode::Local { root: root.clone() };
            if let Some(remote_dir) = remote_dir {
                settings.sync.remote_dir = remote_dir;
            }
            settings.sync.tolerate_corrupt_remote = tolerate_corrupt;
            settings.save(storage.paths())?;
            println!("Sync enabled through {}", root.display());
            println!("  Snapshot: {}", settings.sync.snapshot_path());
        }

        SyncCommands::Disable => {
            settings.sync.mode = SyncMode::Disabled;
            settings.save(storage.paths())?;
            println!("Sync disabled.");
        }

        SyncCommands::Remotes => {
            let orchestrator = SyncOrchestrator::from_settings(storage, settings)?;
            if !orchestrator.is_enabled() {
                println!("Sync is disabled.");
                return Ok(());
            }
            let remotes = orchestrator.list_remote_ledgers()?;
            if remotes.is_empty() {
                println!("No ledgers on the remote yet.");
            }
            for remote in remotes {
                println!("{}", remote);
            }
        }
    }

    Ok(())
}

fn print_report(report: &SyncReport) {
    println!("Synced with {}", report.remote_path);
    if !report.remote_found {
        println!("  (no remote snapshot yet; uploaded this ledger)");
    }
    for (kind, stats) in report.stats.iter() {
        println!("  {:14} {}", kind.to_string(), stats);
    }
    for split in &report.repaired_splits {
        println!("  Repaired split {}", split);
    }
    for orphan in &report.orphans {
        println!("  Warning: {}", orphan);
    }
    println!(
        "  Local ledger {}",
        if report.changed_local { "updated" } else { "unchanged" }
    );
    if report.concurrent_edits {
        println!("  Edits made during the sync will upload on the next run");
    }
}
