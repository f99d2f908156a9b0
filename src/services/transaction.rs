//! Transaction service
//!
//! Lifecycle rules for transactions. Unlike the other kinds a transaction
//! can be deleted without being hidden first. Whenever a row leaves a split,
//! by deletion or by an edit to its split id, a split left with one live
//! row turns that row back into a plain transaction, so no committed split
//! ever has a single live member next to deleted ones.

use crate::audit::Operation;
use crate::error::{LedgerError, LedgerResult};
use crate::models::well_known::STARTING_BALANCE_PAYEE;
use crate::models::{AccountId, SplitId, Transaction, TransactionId};
use crate::storage::Storage;

use super::lifecycle;

/// How a transaction's payee id resolves
enum Counterparty {
    Payee,
    Transfer,
    StartingBalance,
}

/// Service for transaction management
pub struct TransactionService<'a> {
    storage: &'a Storage,
}

impl<'a> TransactionService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Commit a transaction after checking everything it references
    pub fn save(&self, txn: Transaction) -> LedgerResult<Transaction> {
        txn.validate()
            .map_err(|e| LedgerError::Invalid(e.to_string()))?;

        let repo = &self.storage.transactions;
        let stored = lifecycle::check_save(repo, &txn, false)?;

        self.check_references(&txn)?;

        let previous_split = stored.as_ref().and_then(|s| s.split_id);
        if let Some(split_id) = txn.split_id {
            if previous_split != Some(split_id) {
                self.check_joinable(txn.id, split_id)?;
            }
        }

        let saved = lifecycle::commit(txn, stored.as_ref());
        lifecycle::persist(
            self.storage,
            repo,
            lifecycle::save_operation(stored.as_ref()),
            stored.as_ref(),
            &saved,
        )?;

        if let Some(split_id) = previous_split {
            if saved.split_id != Some(split_id) {
                self.dissolve_if_single(split_id)?;
            }
        }

        Ok(saved)
    }

    /// A split whose rows are all deleted is over and takes no new members
    fn check_joinable(&self, id: TransactionId, split_id: SplitId) -> LedgerResult<()> {
        let members = self
            .storage
            .transactions
            .find(|t| t.split_id == Some(split_id) && t.id != id)?;
        if !members.is_empty() && members.iter().all(|t| t.lifecycle.is_deleted()) {
            return Err(lifecycle::conflict::<Transaction>(
                id,
                format!("split {} has been dissolved", split_id),
            ));
        }
        Ok(())
    }

    /// Turn the last live row of a split back into a plain transaction
    fn dissolve_if_single(&self, split_id: SplitId) -> LedgerResult<()> {
        let mut remaining = self.storage.split_members(split_id)?;
        if remaining.len() != 1 {
            return Ok(());
        }

        let sibling = remaining.remove(0);
        let mut single = sibling.clone();
        single.split_id = None;
        let single = lifecycle::commit(single, Some(&sibling));
        tracing::debug!(%split_id, id = %single.id, "dissolving split with one member left");
        lifecycle::persist(
            self.storage,
            &self.storage.transactions,
            Operation::Update,
            Some(&sibling),
            &single,
        )
    }

    fn check_references(&self, txn: &Transaction) -> LedgerResult<()> {
        match self.storage.accounts.get(txn.account_id)? {
            Some(account) if !account.lifecycle.is_deleted() => {}
            Some(_) => return Err(invalid(format!("account {} has been deleted", txn.account_id))),
            None => return Err(invalid(format!("account {} does not exist", txn.account_id))),
        }

        let counterparty = self.resolve_counterparty(txn)?;

        match (counterparty, txn.envelope_id) {
            (Counterparty::Transfer | Counterparty::StartingBalance, Some(_)) => Err(invalid(
                "transfers and starting balances do not use an envelope".into(),
            )),
            (Counterparty::Transfer | Counterparty::StartingBalance, None) => Ok(()),
            (Counterparty::Payee, None) => Err(invalid("an envelope is required".into())),
            (Counterparty::Payee, Some(envelope_id)) => {
                match self.storage.envelopes.get(envelope_id)? {
                    Some(envelope) if !envelope.lifecycle.is_deleted() => Ok(()),
                    Some(_) => Err(invalid(format!("envelope {} has been deleted", envelope_id))),
                    None => Err(invalid(format!("envelope {} does not exist", envelope_id))),
                }
            }
        }
    }

    fn resolve_counterparty(&self, txn: &Transaction) -> LedgerResult<Counterparty> {
        if let Some(destination) = self.storage.accounts.get(txn.payee_as_account())? {
            if destination.lifecycle.is_deleted() {
                return Err(invalid(format!(
                    "transfer account {} has been deleted",
                    destination.id
                )));
            }
            return Ok(Counterparty::Transfer);
        }

        if txn.payee_id == STARTING_BALANCE_PAYEE {
            return Ok(Counterparty::StartingBalance);
        }

        match self.storage.payees.get(txn.payee_id)? {
            Some(payee) if !payee.lifecycle.is_deleted() => Ok(Counterparty::Payee),
            Some(_) => Err(invalid(format!("payee {} has been deleted", txn.payee_id))),
            None => Err(invalid(format!("payee {} does not exist", txn.payee_id))),
        }
    }

    pub fn hide(&self, txn: &Transaction) -> LedgerResult<Transaction> {
        let repo = &self.storage.transactions;
        let (before, hidden) = lifecycle::hide(repo, txn, false)?;
        lifecycle::persist(self.storage, repo, Operation::Hide, Some(&before), &hidden)?;
        Ok(hidden)
    }

    pub fn unhide(&self, txn: &Transaction) -> LedgerResult<Transaction> {
        let repo = &self.storage.transactions;
        let (before, shown) = lifecycle::unhide(repo, txn)?;
        lifecycle::persist(self.storage, repo, Operation::Unhide, Some(&before), &shown)?;
        Ok(shown)
    }

    /// Delete a transaction
    ///
    /// If it belonged to a split with exactly one other live member, that
    /// member leaves the split.
    pub fn soft_delete(&self, txn: &Transaction) -> LedgerResult<Transaction> {
        let repo = &self.storage.transactions;
        let stored = lifecycle::check_delete(repo, txn, false, false)?;

        let deleted = lifecycle::tombstone(&stored);
        lifecycle::persist(self.storage, repo, Operation::Delete, Some(&stored), &deleted)?;

        if let Some(split_id) = stored.split_id {
            self.dissolve_if_single(split_id)?;
        }

        Ok(deleted)
    }

    pub fn get(&self, id: TransactionId) -> LedgerResult<Option<Transaction>> {
        self.storage.transactions.get(id)
    }

    /// Find a non-deleted transaction by short or full id
    pub fn find(&self, identifier: &str) -> LedgerResult<Option<Transaction>> {
        let needle = identifier.trim();
        let matches = self
            .storage
            .transactions
            .find(|t| !t.lifecycle.is_deleted() && t.id.to_string() == needle)?;
        if let Some(txn) = matches.into_iter().next() {
            return Ok(Some(txn));
        }

        match needle.parse::<TransactionId>() {
            Ok(id) => self.storage.transactions.get(id),
            Err(_) => Ok(None),
        }
    }

    /// List transactions by service date, optionally for one account
    pub fn list(
        &self,
        account_id: Option<AccountId>,
        include_hidden: bool,
    ) -> LedgerResult<Vec<Transaction>> {
        let mut txns = self.storage.transactions.find(|t| {
            !t.lifecycle.is_deleted()
                && (include_hidden || !t.lifecycle.is_hidden())
                && account_id.map_or(true, |a| t.account_id == a)
        })?;
        txns.sort_by(|a, b| a.service_date.cmp(&b.service_date).then(a.id.cmp(&b.id)));
        Ok(txns)
    }
}

fn invalid(message: String) -> LedgerError {
    LedgerError::Invalid(message)
}
