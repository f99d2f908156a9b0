use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use envelope_ledger::cli::{
    handle_account_command, handle_envelope_command, handle_group_command, handle_payee_command,
    handle_sync_command, handle_transaction_command, AccountCommands, EnvelopeCommands,
    GroupCommands, PayeeCommands, SyncCommands, TransactionCommands,
};
use envelope_ledger::config::{LedgerPaths, Settings, SyncMode};
use envelope_ledger::storage::init::{initialize_storage, needs_initialization};
use envelope_ledger::storage::Storage;
use envelope_ledger::sync::{SyncOrchestrator, SyncScheduler};

#[derive(Parser)]
#[command(
    name = "envelope",
    author = "Kaylee Beyene",
    version,
    about = "Offline-first envelope budgeting ledger",
    long_about = "An envelope budgeting ledger that works fully offline on every device \
                  and keeps replicas in step by exchanging snapshots through a shared \
                  folder."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new ledger
    Init,

    /// Show current configuration and paths
    Config,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Payee management commands
    #[command(subcommand)]
    Payee(PayeeCommands),

    /// Envelope group management commands
    #[command(subcommand)]
    Group(GroupCommands),

    /// Envelope management commands
    #[command(subcommand)]
    Envelope(EnvelopeCommands),

    /// Transaction management commands
    #[command(subcommand, alias = "txn")]
    Transaction(TransactionCommands),

    /// Replica sync commands
    #[command(subcommand)]
    Sync(SyncCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Initialize paths and settings
    let paths = LedgerPaths::new()?;
    let settings = Settings::load_or_create(&paths)?;

    // Initialize storage
    let storage = Arc::new(Storage::open(paths.clone())?);

    match cli.command {
        Some(Commands::Init) => {
            println!("Initializing ledger at: {}", paths.base_dir().display());
            let seeded = initialize_storage(&storage)?;
            settings.save(&paths)?;
            if seeded > 0 {
                println!("Initialization complete! Created {} built-in entries.", seeded);
            } else {
                println!("Ledger was already initialized.");
            }
            println!();
            println!("Run 'envelope account add <name>' to open your first account.");
        }
        Some(Commands::Config) => {
            println!("Envelope Ledger Configuration");
            println!("=============================");
            println!("Base directory:  {}", paths.base_dir().display());
            println!("Data directory:  {}", paths.data_dir().display());
            println!("Settings file:   {}", paths.settings_file().display());
            println!("Audit log:       {}", paths.audit_log().display());
            println!();
            println!("Settings:");
            println!("  Date format:   {}", settings.date_format);
            match &settings.sync.mode {
                SyncMode::Disabled => println!("  Sync:          disabled"),
                SyncMode::Local { root } => {
                    println!("  Sync:          local ({})", root.display())
                }
            }
        }
        Some(Commands::Sync(cmd)) => {
            require_initialized(&paths, &storage)?;
            handle_sync_command(storage, settings, cmd).await?;
        }
        Some(command) => {
            require_initialized(&paths, &storage)?;
            run_ledger_command(storage, settings, command).await?;
        }
        None => {
            println!("Envelope Ledger - offline-first envelope budgeting");
            println!();
            println!("Run 'envelope --help' for usage information.");
            println!("Run 'envelope init' to create a ledger.");
        }
    }

    Ok(())
}

fn require_initialized(paths: &LedgerPaths, storage: &Storage) -> Result<()> {
    if !paths.is_initialized() || needs_initialization(storage)? {
        bail!("Ledger not initialized. Run 'envelope init' first.");
    }
    Ok(())
}

/// Run a ledger command with background sync attached
///
/// With sync enabled the scheduler is triggered at start and flushed on
/// exit, so a command produces at most one cycle.
async fn run_ledger_command(
    storage: Arc<Storage>,
    settings: Settings,
    command: Commands,
) -> Result<()> {
    let scheduler = if settings.sync.mode.is_enabled() {
        let debounce = Duration::from_secs(settings.sync.debounce_secs);
        let orchestrator = SyncOrchestrator::from_settings(Arc::clone(&storage), settings)?;
        let scheduler = SyncScheduler::spawn(Arc::new(orchestrator), debounce);
        scheduler.trigger();
        Some(scheduler)
    } else {
        None
    };

    let result = match command {
        Commands::Account(cmd) => handle_account_command(&storage, cmd),
        Commands::Payee(cmd) => handle_payee_command(&storage, cmd),
        Commands::Group(cmd) => handle_group_command(&storage, cmd),
        Commands::Envelope(cmd) => handle_envelope_command(&storage, cmd),
        Commands::Transaction(cmd) => handle_transaction_command(&storage, cmd),
        Commands::Init | Commands::Config | Commands::Sync(_) => Ok(()),
    };

    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await;
    }

    Ok(result?)
}
