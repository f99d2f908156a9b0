//! Snapshot export and import
//!
//! A snapshot is one self-describing JSON document holding every committed
//! row of every kind, tombstones and hidden rows included. Importing one
//! materializes it into a throwaway store under a temporary directory, so
//! the live store is untouched until a merge has fully succeeded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::config::paths::LedgerPaths;
use crate::error::{LedgerError, LedgerResult};
use crate::models::{Entity, Ledger};
use crate::storage::Storage;

/// Marker identifying our snapshots
pub const SNAPSHOT_FORMAT: &str = "envelope-ledger-snapshot";

/// Schema version written by this build and the only one it reads
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDocument {
    format: String,
    schema_version: u32,
    exported_at: DateTime<Utc>,
    ledger: Ledger,
}

/// Serialize the live store
pub fn export(storage: &Storage) -> LedgerResult<Vec<u8>> {
    export_ledger(&storage.ledger()?)
}

/// Serialize a ledger as a snapshot, entities sorted by id
pub fn export_ledger(ledger: &Ledger) -> LedgerResult<Vec<u8>> {
    if ledger.has_drafts() {
        return Err(LedgerError::Storage(
            "Refusing to export a ledger containing drafts".into(),
        ));
    }

    let mut ledger = ledger.clone();
    ledger.sort();

    let document = SnapshotDocument {
        format: SNAPSHOT_FORMAT.to_string(),
        schema_version: SCHEMA_VERSION,
        exported_at: Utc::now(),
        ledger,
    };

    Ok(serde_json::to_vec_pretty(&document)?)
}

/// Canonical bytes of a ledger's content, independent of export time
pub fn canonical_bytes(ledger: &Ledger) -> LedgerResult<Vec<u8>> {
    let mut ledger = ledger.clone();
    ledger.sort();
    Ok(serde_json::to_vec(&ledger)?)
}

/// A downloaded snapshot loaded into an isolated store
///
/// Dropping the handle deletes the store's directory.
pub struct ImportedSnapshot {
    // Declared before the directory so it is dropped first
    storage: Storage,
    exported_at: DateTime<Utc>,
    _dir: TempDir,
}

impl std::fmt::Debug for ImportedSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportedSnapshot")
            .field("exported_at", &self.exported_at)
            .finish_non_exhaustive()
    }
}

impl ImportedSnapshot {
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn exported_at(&self) -> DateTime<Utc> {
        self.exported_at
    }

    pub fn ledger(&self) -> LedgerResult<Ledger> {
        self.storage.ledger()
    }
}

/// Parse snapshot bytes and materialize them into a temporary store
///
/// Anything that is not a well-formed snapshot of the supported schema
/// version fails with `Corrupt`.
pub fn import(bytes: &[u8]) -> LedgerResult<ImportedSnapshot> {
    let (exported_at, ledger) = parse(bytes)?;

    let dir = TempDir::new()
        .map_err(|e| LedgerError::Io(format!("Failed to create temporary store: {}", e)))?;
    let storage = Storage::new(LedgerPaths::with_base_dir(dir.path().to_path_buf()))?;
    storage.replace_ledger(ledger)?;

    Ok(ImportedSnapshot {
        storage,
        exported_at,
        _dir: dir,
    })
}

fn parse(bytes: &[u8]) -> LedgerResult<(DateTime<Utc>, Ledger)> {
    let value: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| LedgerError::Corrupt(format!("not JSON: {}", e)))?;

    match value.get("format").and_then(|f| f.as_str()) {
        Some(SNAPSHOT_FORMAT) => {}
        Some(other) => {
            return Err(LedgerError::Corrupt(format!("unknown format '{}'", other)));
        }
        None => return Err(LedgerError::Corrupt("missing format marker".into())),
    }

    match value.get("schema_version").and_then(|v| v.as_u64()) {
        Some(version) if version == u64::from(SCHEMA_VERSION) => {}
        Some(version) => {
            return Err(LedgerError::Corrupt(format!(
                "unsupported schema version {}",
                version
            )));
        }
        None => return Err(LedgerError::Corrupt("missing schema version".into())),
    }

    let document: SnapshotDocument = serde_json::from_value(value)
        .map_err(|e| LedgerError::Corrupt(format!("malformed ledger: {}", e)))?;

    let ledger = document.ledger;
    if ledger.has_drafts() {
        return Err(LedgerError::Corrupt("snapshot contains drafts".into()));
    }
    ensure_unique_ids(&ledger.accounts)?;
    ensure_unique_ids(&ledger.payees)?;
    ensure_unique_ids(&ledger.envelope_groups)?;
    ensure_unique_ids(&ledger.envelopes)?;
    ensure_unique_ids(&ledger.transactions)?;

    Ok((document.exported_at, ledger))
}

fn ensure_unique_ids<T: Entity>(entities: &[T]) -> LedgerResult<()> {
    let mut ids: Vec<T::Id> = entities.iter().map(Entity::id).collect();
    ids.sort();
    match ids.windows(2).find(|pair| pair[0] == pair[1]) {
        Some(pair) => Err(LedgerError::Corrupt(format!(
            "duplicate {} id {}",
            T::KIND,
            pair[0]
        ))),
        None => Ok(()),
    }
}
