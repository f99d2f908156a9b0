//! Debounced background sync
//!
//! The scheduler listens to ledger events and restarts a quiet-period timer
//! on every mutation. When the timer fires a cycle is started on the
//! blocking pool and the loop goes back to listening; it never waits on a
//! cycle except at shutdown.
//!
//! A timer that fires while a cycle is still running is held over until that
//! cycle finishes, so edits made mid-cycle always get a cycle of their own.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, trace};

use crate::error::LedgerResult;
use crate::events::LedgerEvent;

use super::orchestrator::{SyncOrchestrator, SyncOutcome};

enum Command {
    Trigger,
    Shutdown(oneshot::Sender<()>),
}

type CycleSet = JoinSet<LedgerResult<SyncOutcome>>;

/// Handle to the scheduler task
pub struct SyncScheduler {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl SyncScheduler {
    /// Start the scheduler on the current tokio runtime
    pub fn spawn(orchestrator: Arc<SyncOrchestrator>, debounce: Duration) -> Self {
        let events = orchestrator.storage().events().subscribe();
        let (commands, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(orchestrator, debounce, events, receiver));
        Self { commands, task }
    }

    /// Schedule a cycle after the quiet period, as on application start
    pub fn trigger(&self) {
        let _ = self.commands.send(Command::Trigger);
    }

    /// Stop the scheduler
    ///
    /// Waits for running cycles, then runs one more if a trigger is still
    /// pending.
    pub async fn shutdown(self) {
        let (ack, done) = oneshot::channel();
        if self.commands.send(Command::Shutdown(ack)).is_ok() {
            let _ = done.await;
        }
        if let Err(err) = self.task.await {
            error!(error = %err, "sync scheduler task failed");
        }
    }
}

async fn run(
    orchestrator: Arc<SyncOrchestrator>,
    debounce: Duration,
    mut events: broadcast::Receiver<LedgerEvent>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut deadline: Option<Instant> = None;
    let mut rerun = false;
    let mut in_flight = CycleSet::new();
    let mut events_open = true;

    loop {
        tokio::select! {
            event = events.recv(), if events_open => match event {
                Ok(event) if event.is_mutation() => {
                    trace!(?event, "mutation, restarting debounce");
                    deadline = Some(Instant::now() + debounce);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "event receiver lagged");
                    deadline = Some(Instant::now() + debounce);
                }
                Err(RecvError::Closed) => events_open = false,
            },
            command = commands.recv() => match command {
                Some(Command::Trigger) => deadline = Some(Instant::now() + debounce),
                Some(Command::Shutdown(ack)) => {
                    let pending = deadline.is_some() || rerun;
                    flush(&orchestrator, &mut events, pending, &mut in_flight).await;
                    let _ = ack.send(());
                    return;
                }
                None => {
                    let pending = deadline.is_some() || rerun;
                    flush(&orchestrator, &mut events, pending, &mut in_flight).await;
                    return;
                }
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                if in_flight.is_empty() {
                    start_cycle(&orchestrator, &mut in_flight);
                } else {
                    trace!("cycle still running, holding the request");
                    rerun = true;
                }
            },
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if log_cycle(joined) || rerun {
                    rerun = false;
                    start_cycle(&orchestrator, &mut in_flight);
                }
            },
        }
    }
}

fn start_cycle(orchestrator: &Arc<SyncOrchestrator>, in_flight: &mut CycleSet) {
    let orchestrator = Arc::clone(orchestrator);
    in_flight.spawn_blocking(move || orchestrator.run_cycle());
}

async fn flush(
    orchestrator: &Arc<SyncOrchestrator>,
    events: &mut broadcast::Receiver<LedgerEvent>,
    mut pending: bool,
    in_flight: &mut CycleSet,
) {
    // Mutations published just before shutdown may still be queued
    loop {
        match events.try_recv() {
            Ok(event) if event.is_mutation() => pending = true,
            Ok(_) => {}
            Err(TryRecvError::Lagged(_)) => pending = true,
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        pending |= log_cycle(joined);
    }

    if pending {
        debug!("running pending sync before shutdown");
        start_cycle(orchestrator, in_flight);
        while let Some(joined) = in_flight.join_next().await {
            log_cycle(joined);
        }
    }
}

/// Log a finished cycle; true when it left local edits still to upload
fn log_cycle(joined: Result<LedgerResult<SyncOutcome>, JoinError>) -> bool {
    match joined {
        Ok(Ok(SyncOutcome::Completed(report))) => {
            debug!(
                changed_local = report.changed_local,
                concurrent_edits = report.concurrent_edits,
                "scheduled cycle completed"
            );
            report.concurrent_edits
        }
        Ok(Ok(outcome)) => {
            debug!(?outcome, "scheduled cycle skipped");
            false
        }
        // Already logged by the orchestrator
        Ok(Err(_)) => false,
        Err(err) => {
            error!(error = %err, "sync cycle panicked");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::paths::LedgerPaths;
    use crate::config::Settings;
    use crate::models::Payee;
    use crate::services::PayeeService;
    use crate::storage::{initialize_storage, Storage};
    use crate::sync::transport::{FileTransport, MemoryFileTransport};
    use tempfile::TempDir;

    fn orchestrator(temp_dir: &TempDir, remote: &MemoryFileTransport) -> Arc<SyncOrchestrator> {
        let paths = LedgerPaths::with_base_dir(temp_dir.path().to_path_buf());
        let storage = Arc::new(Storage::open(paths).unwrap());
        initialize_storage(&storage).unwrap();
        Arc::new(SyncOrchestrator::with_transport(
            storage,
            Settings::default(),
            Arc::new(remote.clone()),
        ))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_burst_of_edits_runs_one_cycle() {
        let temp_dir = TempDir::new().unwrap();
        let remote = MemoryFileTransport::new();
        let orchestrator = orchestrator(&temp_dir, &remote);
        let scheduler = SyncScheduler::spawn(Arc::clone(&orchestrator), Duration::from_millis(200));

        let service = PayeeService::new(orchestrator.storage());
        for name in ["Grocer", "Baker", "Butcher", "Cafe", "Garage"] {
            service.save(Payee::new(name)).unwrap();
        }

        scheduler.shutdown().await;
        assert_eq!(orchestrator.status().cycles_completed, 1);
        assert!(remote.exists("EnvelopeLedger/ledger.json").unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_trigger_fires_after_quiet_period() {
        let temp_dir = TempDir::new().unwrap();
        let remote = MemoryFileTransport::new();
        let orchestrator = orchestrator(&temp_dir, &remote);
        let scheduler = SyncScheduler::spawn(Arc::clone(&orchestrator), Duration::from_millis(50));

        scheduler.trigger();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(orchestrator.status().cycles_completed, 1);

        // Nothing pending, so shutdown does not sync again
        scheduler.shutdown().await;
        assert_eq!(orchestrator.status().cycles_completed, 1);
    }

    /// Remote whose uploads take a while to land
    struct SlowUploads(MemoryFileTransport);

    impl FileTransport for SlowUploads {
        fn exists(&self, path: &str) -> LedgerResult<bool> {
            self.0.exists(path)
        }

        fn read_all(&self, path: &str) -> LedgerResult<Vec<u8>> {
            self.0.read_all(path)
        }

        fn write_all(&self, path: &str, bytes: &[u8]) -> LedgerResult<()> {
            std::thread::sleep(Duration::from_millis(300));
            self.0.write_all(path, bytes)
        }

        fn delete(&self, path: &str) -> LedgerResult<()> {
            self.0.delete(path)
        }

        fn move_file(&self, src: &str, dst: &str, overwrite: bool) -> LedgerResult<()> {
            self.0.move_file(src, dst, overwrite)
        }

        fn list_files(&self, dir: &str) -> LedgerResult<Vec<String>> {
            self.0.list_files(dir)
        }

        fn list_directories(&self, dir: &str) -> LedgerResult<Vec<String>> {
            self.0.list_directories(dir)
        }

        fn create_directory(&self, dir: &str) -> LedgerResult<()> {
            self.0.create_directory(dir)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_edit_during_cycle_gets_its_own_cycle() {
        let temp_dir = TempDir::new().unwrap();
        let remote = MemoryFileTransport::new();
        let paths = LedgerPaths::with_base_dir(temp_dir.path().to_path_buf());
        let storage = Arc::new(Storage::open(paths).unwrap());
        initialize_storage(&storage).unwrap();
        let orchestrator = Arc::new(SyncOrchestrator::with_transport(
            storage,
            Settings::default(),
            Arc::new(SlowUploads(remote.clone())),
        ));
        let scheduler = SyncScheduler::spawn(Arc::clone(&orchestrator), Duration::from_millis(20));

        scheduler.trigger();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let grocer = PayeeService::new(orchestrator.storage())
            .save(Payee::new("Grocer"))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(orchestrator.status().cycles_completed, 2);
        let bytes = remote.read_all("EnvelopeLedger/ledger.json").unwrap();
        let uploaded = crate::sync::snapshot::import(&bytes).unwrap().ledger().unwrap();
        assert!(uploaded.payees.iter().any(|p| p.id == grocer.id));

        scheduler.shutdown().await;
        assert_eq!(orchestrator.status().cycles_completed, 2);
    }

    #[tokio::test]
    async fn test_idle_shutdown_runs_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let remote = MemoryFileTransport::new();
        let orchestrator = orchestrator(&temp_dir, &remote);
        let scheduler = SyncScheduler::spawn(Arc::clone(&orchestrator), Duration::from_secs(5));

        scheduler.shutdown().await;
        assert_eq!(orchestrator.status().cycles_completed, 0);
        assert!(!remote.exists("EnvelopeLedger/ledger.json").unwrap());
    }
}
