//! Replica sync
//!
//! Replicas exchange whole-ledger snapshots through a shared file store.
//! Each cycle merges the remote snapshot into the local ledger and uploads
//! the result, so every replica converges on the same rows.

pub mod lock;
pub mod merge;
pub mod orchestrator;
pub mod scheduler;
pub mod snapshot;
pub mod transport;

pub use lock::{SyncGuard, SyncLock};
pub use merge::{merge_entities, merge_ledgers, KindStats, LedgerMerge, MergeResult, MergeStats, Orphan};
pub use orchestrator::{SyncOrchestrator, SyncOutcome, SyncReport, SyncState, SyncStatus};
pub use scheduler::SyncScheduler;
pub use snapshot::{ImportedSnapshot, SCHEMA_VERSION, SNAPSHOT_FORMAT};
pub use transport::{open_transport, FileTransport, LocalFileTransport, MemoryFileTransport};
