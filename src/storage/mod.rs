//! Storage layer for the envelope ledger
//!
//! Provides JSON file storage with atomic writes, one repository per entity
//! kind, and the read-only referential lookups the lifecycle rules need.

pub mod file_io;
pub mod init;
pub mod repository;

pub use file_io::{read_json, write_json_atomic};
pub use init::initialize_storage;
pub use repository::Repository;

use std::sync::{Mutex, MutexGuard};

use crate::audit::{AuditEntry, AuditLogger};
use crate::config::paths::LedgerPaths;
use crate::error::{LedgerError, LedgerResult};
use crate::events::EventBus;
use crate::models::{
    Account, AccountId, Envelope, EnvelopeGroup, EnvelopeGroupId, EnvelopeId, Ledger, Payee,
    PayeeId, SplitId, Transaction,
};

/// Main storage coordinator that provides access to all repositories
pub struct Storage {
    paths: LedgerPaths,
    pub accounts: Repository<Account>,
    pub payees: Repository<Payee>,
    pub envelope_groups: Repository<EnvelopeGroup>,
    pub envelopes: Repository<Envelope>,
    pub transactions: Repository<Transaction>,
    events: EventBus,
    audit: AuditLogger,
    commit_gate: Mutex<()>,
}

impl Storage {
    /// Create a new, empty Storage instance
    pub fn new(paths: LedgerPaths) -> LedgerResult<Self> {
        paths.ensure_directories()?;

        Ok(Self {
            accounts: Repository::new(paths.accounts_file()),
            payees: Repository::new(paths.payees_file()),
            envelope_groups: Repository::new(paths.envelope_groups_file()),
            envelopes: Repository::new(paths.envelopes_file()),
            transactions: Repository::new(paths.transactions_file()),
            events: EventBus::new(),
            audit: AuditLogger::new(paths.audit_log()),
            commit_gate: Mutex::new(()),
            paths,
        })
    }

    /// Create a Storage instance and load everything from disk
    pub fn open(paths: LedgerPaths) -> LedgerResult<Self> {
        let storage = Self::new(paths)?;
        storage.load_all()?;
        Ok(storage)
    }

    pub fn paths(&self) -> &LedgerPaths {
        &self.paths
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// Append an audit entry
    pub fn log_audit(&self, entry: &AuditEntry) -> LedgerResult<()> {
        self.audit.log(entry)
    }

    /// Load all data from disk
    pub fn load_all(&self) -> LedgerResult<()> {
        self.accounts.load()?;
        self.payees.load()?;
        self.envelope_groups.load()?;
        self.envelopes.load()?;
        self.transactions.load()?;
        Ok(())
    }

    /// Save all data to disk
    pub fn save_all(&self) -> LedgerResult<()> {
        self.accounts.save()?;
        self.payees.save()?;
        self.envelope_groups.save()?;
        self.envelopes.save()?;
        self.transactions.save()?;
        Ok(())
    }

    /// Every committed row of every kind, sorted by id
    pub fn ledger(&self) -> LedgerResult<Ledger> {
        Ok(Ledger {
            accounts: self.accounts.snapshot()?,
            payees: self.payees.snapshot()?,
            envelope_groups: self.envelope_groups.snapshot()?,
            envelopes: self.envelopes.snapshot()?,
            transactions: self.transactions.snapshot()?,
        })
    }

    /// Held while a commit is written
    ///
    /// Lifecycle writes and whole-ledger replacement both take it, so a
    /// replacement computed from the current rows cannot race an edit.
    pub(crate) fn commit_gate(&self) -> LedgerResult<MutexGuard<'_, ()>> {
        self.commit_gate
            .lock()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire commit lock: {}", e)))
    }

    /// Replace the whole ledger and persist it
    ///
    /// Either every kind is swapped and written, or the previous contents are
    /// put back in memory (and re-persisted best effort) and the error is
    /// returned.
    pub fn replace_ledger(&self, ledger: Ledger) -> LedgerResult<()> {
        let _gate = self.commit_gate()?;
        self.store_ledger(ledger)
    }

    /// Rebuild the ledger from its committed contents and persist the result
    ///
    /// `rebuild` sees the rows as they are at this instant; no lifecycle
    /// write lands until the result is stored. Returning `None` leaves the
    /// store untouched. Returns whether anything was stored.
    pub fn update_ledger<F>(&self, rebuild: F) -> LedgerResult<bool>
    where
        F: FnOnce(Ledger) -> LedgerResult<Option<Ledger>>,
    {
        let _gate = self.commit_gate()?;
        match rebuild(self.ledger()?)? {
            Some(ledger) => {
                self.store_ledger(ledger)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn store_ledger(&self, ledger: Ledger) -> LedgerResult<()> {
        if ledger.has_drafts() {
            return Err(LedgerError::Storage(
                "Refusing to store a ledger containing drafts".into(),
            ));
        }

        let previous = self.swap_in(ledger)?;

        if let Err(err) = self.save_all() {
            tracing::error!(error = %err, "persisting replaced ledger failed, rolling back");
            self.swap_in(previous)?;
            if let Err(restore_err) = self.save_all() {
                tracing::error!(error = %restore_err, "re-persisting previous ledger failed");
            }
            return Err(err);
        }

        Ok(())
    }

    fn swap_in(&self, ledger: Ledger) -> LedgerResult<Ledger> {
        Ok(Ledger {
            accounts: self.accounts.replace_all(ledger.accounts)?,
            payees: self.payees.replace_all(ledger.payees)?,
            envelope_groups: self.envelope_groups.replace_all(ledger.envelope_groups)?,
            envelopes: self.envelopes.replace_all(ledger.envelopes)?,
            transactions: self.transactions.replace_all(ledger.transactions)?,
        })
    }

    /// Non-deleted transactions drawn on an account or paying into it as a transfer
    pub fn active_transactions_for_account(&self, id: AccountId) -> LedgerResult<Vec<Transaction>> {
        let as_payee = PayeeId::from(id);
        self.transactions
            .find(|t| !t.lifecycle.is_deleted() && (t.account_id == id || t.payee_id == as_payee))
    }

    pub fn active_transactions_for_payee(&self, id: PayeeId) -> LedgerResult<Vec<Transaction>> {
        self.transactions
            .find(|t| !t.lifecycle.is_deleted() && t.payee_id == id)
    }

    pub fn active_transactions_for_envelope(
        &self,
        id: EnvelopeId,
    ) -> LedgerResult<Vec<Transaction>> {
        self.transactions
            .find(|t| !t.lifecycle.is_deleted() && t.envelope_id == Some(id))
    }

    /// Non-deleted envelopes filed under a group, hidden ones included
    pub fn active_envelopes_in_group(&self, id: EnvelopeGroupId) -> LedgerResult<Vec<Envelope>> {
        self.envelopes
            .find(|e| !e.lifecycle.is_deleted() && e.group_id == id)
    }

    /// Non-deleted members of a split group
    pub fn split_members(&self, split_id: SplitId) -> LedgerResult<Vec<Transaction>> {
        self.transactions
            .find(|t| !t.lifecycle.is_deleted() && t.split_id == Some(split_id))
    }

    /// Check if this replica has been initialized (config file exists)
    pub fn is_initialized(&self) -> bool {
        self.paths.is_initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountType, Money};
    use chrono::{NaiveDate, Utc};
    use tempfile::TempDir;

    fn storage() -> (TempDir, Storage) {
        let temp_dir = TempDir::new().unwrap();
        let paths = LedgerPaths::with_base_dir(temp_dir.path().to_path_buf());
        let storage = Storage::new(paths).unwrap();
        (temp_dir, storage)
    }

    fn committed_account(name: &str) -> Account {
        let mut account = Account::new(name, AccountType::Checking);
        account.lifecycle.commit(Utc::now());
        account
    }

    #[test]
    fn test_storage_creation() {
        let (temp_dir, storage) = storage();
        assert!(temp_dir.path().join("data").exists());
        assert!(!storage.is_initialized());
        assert!(storage.ledger().unwrap().is_empty());
    }

    #[test]
    fn test_replace_ledger_persists() {
        let (temp_dir, storage) = storage();

        let mut ledger = Ledger::default();
        ledger.accounts.push(committed_account("Checking"));
        storage.replace_ledger(ledger.clone()).unwrap();

        let reopened =
            Storage::open(LedgerPaths::with_base_dir(temp_dir.path().to_path_buf())).unwrap();
        assert_eq!(reopened.ledger().unwrap(), ledger);
    }

    #[test]
    fn test_update_ledger_sees_current_rows() {
        let (_temp_dir, storage) = storage();
        let checking = committed_account("Checking");
        storage.accounts.upsert(checking.clone()).unwrap();

        let stored = storage
            .update_ledger(|current| {
                assert_eq!(current.accounts, vec![checking.clone()]);
                Ok(None)
            })
            .unwrap();
        assert!(!stored);

        let savings = committed_account("Savings");
        let stored = storage
            .update_ledger(|mut current| {
                current.accounts.push(savings.clone());
                Ok(Some(current))
            })
            .unwrap();
        assert!(stored);
        assert_eq!(storage.accounts.count().unwrap(), 2);
    }

    #[test]
    fn test_replace_ledger_rejects_drafts() {
        let (_temp_dir, storage) = storage();
        storage.accounts.upsert(committed_account("Kept")).unwrap();

        let mut ledger = Ledger::default();
        ledger.accounts.push(Account::new("Draft", AccountType::Savings));

        assert!(storage.replace_ledger(ledger).is_err());
        assert_eq!(storage.accounts.count().unwrap(), 1);
    }

    #[test]
    fn test_transfer_counts_as_account_reference() {
        let (_temp_dir, storage) = storage();

        let from = committed_account("Checking");
        let to = committed_account("Savings");
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let mut transfer = Transaction::transfer(from.id, to.id, date, Money::from_cents(-100));
        transfer.lifecycle.commit(Utc::now());
        storage.transactions.upsert(transfer).unwrap();

        assert_eq!(storage.active_transactions_for_account(from.id).unwrap().len(), 1);
        assert_eq!(storage.active_transactions_for_account(to.id).unwrap().len(), 1);
    }
}
