//! Sync orchestrator
//!
//! One cycle pulls the remote snapshot (if any), merges it with the local
//! ledger, uploads the merged result and then commits it locally. Until the
//! local commit succeeds the local store is untouched, so a cycle that fails
//! anywhere leaves this replica exactly as it was.
//!
//! Edits keep landing while a cycle runs. The local commit therefore merges
//! the result once more with the rows committed at that moment, under the
//! store's commit lock, and reports when it had to.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::audit::AuditEntry;
use crate::config::Settings;
use crate::error::{LedgerError, LedgerResult};
use crate::events::{CycleResult, LedgerEvent};
use crate::models::{Ledger, SplitId};
use crate::storage::Storage;

use super::lock::SyncLock;
use super::merge::{merge_ledgers, LedgerMerge, MergeStats, Orphan};
use super::snapshot::{self, ImportedSnapshot};
use super::transport::{open_transport, FileTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Observable state of the orchestrator
#[derive(Debug, Clone)]
pub struct SyncStatus {
    pub state: SyncState,
    pub last_error: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub cycles_completed: u64,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            state: SyncState::Idle,
            last_error: None,
            last_synced_at: None,
            cycles_completed: 0,
        }
    }
}

/// What a completed cycle did
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub remote_path: String,
    pub remote_found: bool,
    pub stats: MergeStats,
    pub repaired_splits: Vec<SplitId>,
    pub orphans: Vec<Orphan>,
    /// Whether the merge changed the local ledger
    pub changed_local: bool,
    /// Local edits committed during the cycle were folded into the local
    /// ledger but are not in the uploaded snapshot yet
    pub concurrent_edits: bool,
    pub completed_at: DateTime<Utc>,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub enum SyncOutcome {
    /// Sync is turned off; nothing was read or written
    Disabled,
    /// Another cycle held the lock; this request was dropped
    AlreadyRunning,
    Completed(SyncReport),
}

pub struct SyncOrchestrator {
    storage: Arc<Storage>,
    settings: Mutex<Settings>,
    transport: Option<Arc<dyn FileTransport>>,
    lock: SyncLock,
    status: Mutex<SyncStatus>,
}

impl SyncOrchestrator {
    /// Orchestrator for the transport configured in `settings`, sharing the
    /// process-wide lock
    pub fn from_settings(storage: Arc<Storage>, settings: Settings) -> LedgerResult<Self> {
        let transport = open_transport(&settings.sync.mode)?;
        Ok(Self::new(storage, settings, transport, SyncLock::process()))
    }

    /// Orchestrator over an explicit transport with a private lock
    pub fn with_transport(
        storage: Arc<Storage>,
        settings: Settings,
        transport: Arc<dyn FileTransport>,
    ) -> Self {
        Self::new(storage, settings, Some(transport), SyncLock::new())
    }

    pub fn with_lock(mut self, lock: SyncLock) -> Self {
        self.lock = lock;
        self
    }

    fn new(
        storage: Arc<Storage>,
        settings: Settings,
        transport: Option<Arc<dyn FileTransport>>,
        lock: SyncLock,
    ) -> Self {
        let status = SyncStatus {
            last_synced_at: settings.sync.last_synced_at,
            ..SyncStatus::default()
        };
        Self {
            storage,
            settings: Mutex::new(settings),
            transport,
            lock,
            status: Mutex::new(status),
        }
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    pub fn settings(&self) -> Settings {
        lock_ignoring_poison(&self.settings).clone()
    }

    pub fn status(&self) -> SyncStatus {
        lock_ignoring_poison(&self.status).clone()
    }

    /// Ledger directories present under the remote root
    pub fn list_remote_ledgers(&self) -> LedgerResult<Vec<String>> {
        match &self.transport {
            Some(transport) => transport.list_directories(""),
            None => Ok(Vec::new()),
        }
    }

    /// Run one sync cycle on the calling thread
    ///
    /// Returns `AlreadyRunning` without doing anything if another cycle holds
    /// the lock. A failed cycle leaves the local ledger unchanged.
    #[tracing::instrument(skip(self))]
    pub fn run_cycle(&self) -> LedgerResult<SyncOutcome> {
        let Some(_guard) = self.lock.try_acquire() else {
            debug!("sync already running, dropping request");
            return Ok(SyncOutcome::AlreadyRunning);
        };

        let Some(transport) = self.transport.clone() else {
            self.update_status(|status| {
                status.state = SyncState::Succeeded;
                status.last_error = None;
            });
            self.storage.events().publish(LedgerEvent::SyncCompleted {
                outcome: CycleResult::Disabled,
            });
            return Ok(SyncOutcome::Disabled);
        };

        self.update_status(|status| status.state = SyncState::Running);
        let started = Instant::now();

        match self.sync_with(transport.as_ref(), started) {
            Ok(report) => {
                info!(
                    remote = %report.remote_path,
                    remote_found = report.remote_found,
                    changed_local = report.changed_local,
                    elapsed_ms = report.duration.as_millis() as u64,
                    "sync cycle completed"
                );
                self.update_status(|status| {
                    status.state = SyncState::Succeeded;
                    status.last_error = None;
                    status.last_synced_at = Some(report.completed_at);
                    status.cycles_completed += 1;
                });
                self.storage.events().publish(LedgerEvent::SyncCompleted {
                    outcome: CycleResult::Succeeded,
                });
                Ok(SyncOutcome::Completed(report))
            }
            Err(err) => {
                warn!(error = %err, "sync cycle failed");
                self.update_status(|status| {
                    status.state = SyncState::Failed;
                    status.last_error = Some(err.to_string());
                });
                self.storage.events().publish(LedgerEvent::SyncCompleted {
                    outcome: CycleResult::Failed,
                });
                Err(err)
            }
        }
    }

    fn sync_with(&self, transport: &dyn FileTransport, started: Instant) -> LedgerResult<SyncReport> {
        let sync = self.settings().sync;
        let remote_path = sync.snapshot_path();
        let upload_path = sync.upload_path();

        if transport.exists(&upload_path)? {
            debug!(path = %upload_path, "removing stale upload");
            transport.delete(&upload_path)?;
        }

        let remote = fetch_remote(transport, &remote_path, sync.tolerate_corrupt_remote)?;
        let remote_found = remote.is_some();
        let remote_ledger = match &remote {
            Some(imported) => {
                debug!(exported_at = %imported.exported_at(), "loaded remote snapshot");
                imported.ledger()?
            }
            None => Ledger::default(),
        };
        drop(remote);

        let local = self.storage.ledger()?;
        let local_bytes = snapshot::canonical_bytes(&local)?;

        let LedgerMerge {
            ledger: merged,
            stats,
            repaired_splits,
            orphans,
        } = merge_ledgers(local, remote_ledger)?;

        let bytes = snapshot::export_ledger(&merged)?;
        transport.create_directory(&sync.remote_dir)?;
        transport.write_all(&upload_path, &bytes)?;
        transport.move_file(&upload_path, &remote_path, true)?;

        let mut concurrent_edits = false;
        let changed_local = self.storage.update_ledger(|current| {
            let current_bytes = snapshot::canonical_bytes(&current)?;
            if current_bytes == local_bytes {
                let changed = snapshot::canonical_bytes(&merged)? != current_bytes;
                return Ok(changed.then_some(merged));
            }

            concurrent_edits = true;
            let rebased = merge_ledgers(current, merged)?.ledger;
            let changed = snapshot::canonical_bytes(&rebased)? != current_bytes;
            Ok(changed.then_some(rebased))
        })?;
        if concurrent_edits {
            info!("local edits landed during the cycle, merged them into the result");
        }

        let completed_at = Utc::now();
        {
            let mut settings = lock_ignoring_poison(&self.settings);
            settings.sync.last_synced_at = Some(completed_at);
            // The ledger is committed by now; a stale timestamp is all this can cost
            if let Err(err) = settings.save(self.storage.paths()) {
                warn!(error = %err, "failed to record sync time in settings");
            }
        }

        if changed_local {
            let summary = stats
                .iter()
                .filter(|(_, stats)| stats.incoming() > 0)
                .map(|(kind, stats)| format!("{}: {}", kind, stats.incoming()))
                .collect::<Vec<_>>()
                .join(", ");
            let entry = AuditEntry::merge(remote_path.clone(), format!("incoming {}", summary));
            if let Err(err) = self.storage.log_audit(&entry) {
                warn!(error = %err, "failed to record merge in audit log");
            }
        }

        Ok(SyncReport {
            remote_path,
            remote_found,
            stats,
            repaired_splits,
            orphans,
            changed_local,
            concurrent_edits,
            completed_at,
            duration: started.elapsed(),
        })
    }

    fn update_status(&self, f: impl FnOnce(&mut SyncStatus)) {
        f(&mut lock_ignoring_poison(&self.status));
    }
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn fetch_remote(
    transport: &dyn FileTransport,
    remote_path: &str,
    tolerate_corrupt: bool,
) -> LedgerResult<Option<ImportedSnapshot>> {
    if !transport.exists(remote_path)? {
        debug!(remote = %remote_path, "no remote snapshot yet");
        return Ok(None);
    }

    let bytes = transport.read_all(remote_path)?;
    match snapshot::import(&bytes) {
        Ok(imported) => Ok(Some(imported)),
        Err(LedgerError::Corrupt(reason)) if tolerate_corrupt => {
            warn!(remote = %remote_path, %reason, "ignoring corrupt remote snapshot");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}
