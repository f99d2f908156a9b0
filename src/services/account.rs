//! Account service
//!
//! Lifecycle rules for accounts, plus opening an account with a starting
//! balance.

use chrono::NaiveDate;

use crate::audit::Operation;
use crate::error::{LedgerError, LedgerResult};
use crate::models::well_known::STARTING_BALANCE_PAYEE;
use crate::models::{Account, AccountId, Entity, Money, Transaction};
use crate::storage::Storage;

use super::lifecycle;
use super::transaction::TransactionService;

/// Service for account management
pub struct AccountService<'a> {
    storage: &'a Storage,
}

impl<'a> AccountService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Commit a new account or an edit to an existing one
    pub fn save(&self, account: Account) -> LedgerResult<Account> {
        account
            .validate()
            .map_err(|e| LedgerError::Invalid(e.to_string()))?;

        let stored = lifecycle::check_save(&self.storage.accounts, &account, false)?;

        // Names are unique among accounts that have not been deleted
        let name = account.name.trim().to_lowercase();
        let taken = self.storage.accounts.find(|a| {
            a.id != account.id && !a.lifecycle.is_deleted() && a.name.trim().to_lowercase() == name
        })?;
        if !taken.is_empty() {
            return Err(lifecycle::conflict::<Account>(
                account.id,
                format!("an account named '{}' already exists", account.name.trim()),
            ));
        }

        let saved = lifecycle::commit(account, stored.as_ref());
        lifecycle::persist(
            self.storage,
            &self.storage.accounts,
            lifecycle::save_operation(stored.as_ref()),
            stored.as_ref(),
            &saved,
        )?;
        Ok(saved)
    }

    /// Save a new account and record its opening balance
    ///
    /// A non-zero balance becomes a transaction against the well-known
    /// starting-balance payee, with no envelope.
    pub fn open(
        &self,
        account: Account,
        starting_balance: Money,
        opened_on: NaiveDate,
    ) -> LedgerResult<(Account, Option<Transaction>)> {
        if !account.is_new() {
            return Err(lifecycle::invalid_state::<Account>(
                account.id,
                "only a new account can be opened",
            ));
        }

        let account = self.save(account)?;
        if starting_balance.is_zero() {
            return Ok((account, None));
        }

        let mut opening = Transaction::new(
            account.id,
            STARTING_BALANCE_PAYEE,
            None,
            opened_on,
            starting_balance,
        );
        opening.notes = "Starting balance".into();
        let opening = TransactionService::new(self.storage).save(opening)?;

        Ok((account, Some(opening)))
    }

    pub fn hide(&self, account: &Account) -> LedgerResult<Account> {
        let (before, hidden) = lifecycle::hide(&self.storage.accounts, account, false)?;
        lifecycle::persist(self.storage, &self.storage.accounts, Operation::Hide, Some(&before), &hidden)?;
        Ok(hidden)
    }

    pub fn unhide(&self, account: &Account) -> LedgerResult<Account> {
        let (before, shown) = lifecycle::unhide(&self.storage.accounts, account)?;
        lifecycle::persist(self.storage, &self.storage.accounts, Operation::Unhide, Some(&before), &shown)?;
        Ok(shown)
    }

    /// Retire a hidden account that nothing references any more
    pub fn soft_delete(&self, account: &Account) -> LedgerResult<Account> {
        let stored = lifecycle::check_delete(&self.storage.accounts, account, false, true)?;

        let referencing = self.storage.active_transactions_for_account(stored.id)?;
        lifecycle::ensure_unreferenced::<Account>(stored.id, referencing.len(), "transactions")?;

        let deleted = lifecycle::tombstone(&stored);
        lifecycle::persist(self.storage, &self.storage.accounts, Operation::Delete, Some(&stored), &deleted)?;
        Ok(deleted)
    }

    pub fn get(&self, id: AccountId) -> LedgerResult<Option<Account>> {
        self.storage.accounts.get(id)
    }

    /// Find a non-deleted account by name (case-insensitive), short id or full id
    pub fn find(&self, identifier: &str) -> LedgerResult<Option<Account>> {
        let needle = identifier.trim();
        let name = needle.to_lowercase();
        let matches = self.storage.accounts.find(|a| {
            !a.lifecycle.is_deleted() && (a.name.to_lowercase() == name || a.id.to_string() == needle)
        })?;
        if let Some(account) = matches.into_iter().next() {
            return Ok(Some(account));
        }

        match needle.parse::<AccountId>() {
            Ok(id) => self.storage.accounts.get(id),
            Err(_) => Ok(None),
        }
    }

    /// List accounts, sorted by name
    pub fn list(&self, include_hidden: bool) -> LedgerResult<Vec<Account>> {
        let mut accounts = self.storage.accounts.find(|a| {
            !a.lifecycle.is_deleted() && (include_hidden || !a.lifecycle.is_hidden())
        })?;
        accounts.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(accounts)
    }
}
