//! Payee service
//!
//! Lifecycle rules for payees. The starting-balance payee is well-known and
//! can be neither edited, hidden nor deleted.

use crate::audit::Operation;
use crate::error::{LedgerError, LedgerResult};
use crate::models::well_known::is_well_known_payee;
use crate::models::{AccountId, Payee, PayeeId};
use crate::storage::Storage;

use super::lifecycle;

/// Service for payee management
pub struct PayeeService<'a> {
    storage: &'a Storage,
}

impl<'a> PayeeService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub fn save(&self, payee: Payee) -> LedgerResult<Payee> {
        payee
            .validate()
            .map_err(|e| LedgerError::Invalid(e.to_string()))?;

        let stored =
            lifecycle::check_save(&self.storage.payees, &payee, is_well_known_payee(payee.id))?;

        let saved = lifecycle::commit(payee, stored.as_ref());
        lifecycle::persist(
            self.storage,
            &self.storage.payees,
            lifecycle::save_operation(stored.as_ref()),
            stored.as_ref(),
            &saved,
        )?;
        Ok(saved)
    }

    pub fn hide(&self, payee: &Payee) -> LedgerResult<Payee> {
        let (before, hidden) =
            lifecycle::hide(&self.storage.payees, payee, is_well_known_payee(payee.id))?;
        lifecycle::persist(self.storage, &self.storage.payees, Operation::Hide, Some(&before), &hidden)?;
        Ok(hidden)
    }

    pub fn unhide(&self, payee: &Payee) -> LedgerResult<Payee> {
        let (before, shown) = lifecycle::unhide(&self.storage.payees, payee)?;
        lifecycle::persist(self.storage, &self.storage.payees, Operation::Unhide, Some(&before), &shown)?;
        Ok(shown)
    }

    pub fn soft_delete(&self, payee: &Payee) -> LedgerResult<Payee> {
        let stored = lifecycle::check_delete(
            &self.storage.payees,
            payee,
            is_well_known_payee(payee.id),
            true,
        )?;

        // A payee id that is also an account id is that account's transfer payee
        let as_account = AccountId::from_uuid(*stored.id.as_uuid());
        if self.storage.accounts.exists(as_account)? {
            return Err(lifecycle::conflict::<Payee>(
                stored.id,
                "an account shares this payee's id",
            ));
        }

        let referencing = self.storage.active_transactions_for_payee(stored.id)?;
        lifecycle::ensure_unreferenced::<Payee>(stored.id, referencing.len(), "transactions")?;

        let deleted = lifecycle::tombstone(&stored);
        lifecycle::persist(self.storage, &self.storage.payees, Operation::Delete, Some(&stored), &deleted)?;
        Ok(deleted)
    }

    pub fn get(&self, id: PayeeId) -> LedgerResult<Option<Payee>> {
        self.storage.payees.get(id)
    }

    /// Find a non-deleted payee by name (case-insensitive) or id
    pub fn find(&self, identifier: &str) -> LedgerResult<Option<Payee>> {
        let needle = identifier.trim();
        let matches = self.storage.payees.find(|p| {
            !p.lifecycle.is_deleted() && (p.matches_name(needle) || p.id.to_string() == needle)
        })?;
        if let Some(payee) = matches.into_iter().next() {
            return Ok(Some(payee));
        }

        match needle.parse::<PayeeId>() {
            Ok(id) => self.storage.payees.get(id),
            Err(_) => Ok(None),
        }
    }

    /// Find an active payee by name, or commit a new one
    pub fn get_or_create(&self, name: &str) -> LedgerResult<Payee> {
        match self.find(name)? {
            Some(payee) if !payee.lifecycle.is_hidden() => Ok(payee),
            Some(payee) => Err(LedgerError::Invalid(format!(
                "payee '{}' is hidden; unhide it first",
                payee.description
            ))),
            None => self.save(Payee::new(name.trim())),
        }
    }

    /// List payees, sorted by description
    pub fn list(&self, include_hidden: bool) -> LedgerResult<Vec<Payee>> {
        let mut payees = self.storage.payees.find(|p| {
            !p.lifecycle.is_deleted() && (include_hidden || !p.lifecycle.is_hidden())
        })?;
        payees.sort_by_key(|p| Payee::normalize_name(&p.description));
        Ok(payees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::paths::LedgerPaths;
    use crate::models::well_known::STARTING_BALANCE_PAYEE;
    use crate::storage::initialize_storage;
    use tempfile::TempDir;

    fn create_test_storage() -> (TempDir, Storage) {
        let temp_dir = TempDir::new().unwrap();
        let paths = LedgerPaths::with_base_dir(temp_dir.path().to_path_buf());
        let storage = Storage::open(paths).unwrap();
        initialize_storage(&storage).unwrap();
        (temp_dir, storage)
    }

    #[test]
    fn test_starting_balance_payee_is_protected() {
        let (_temp_dir, storage) = create_test_storage();
        let service = PayeeService::new(&storage);
        let payee = service.get(STARTING_BALANCE_PAYEE).unwrap().unwrap();

        assert!(service.hide(&payee).unwrap_err().is_conflict());
        assert!(service.soft_delete(&payee).unwrap_err().is_conflict());

        let mut edit = payee.clone();
        edit.description = "Opening".into();
        assert!(service.save(edit).unwrap_err().is_conflict());
    }

    #[test]
    fn test_get_or_create_reuses_by_name() {
        let (_temp_dir, storage) = create_test_storage();
        let service = PayeeService::new(&storage);

        let created = service.get_or_create("Corner Grocer").unwrap();
        let found = service.get_or_create("  corner grocer ").unwrap();
        assert_eq!(created.id, found.id);
    }

    #[test]
    fn test_hidden_payee_can_be_deleted() {
        let (_temp_dir, storage) = create_test_storage();
        let service = PayeeService::new(&storage);

        let payee = service.save(Payee::new("Gym")).unwrap();
        let hidden = service.hide(&payee).unwrap();
        let deleted = service.soft_delete(&hidden).unwrap();

        assert!(deleted.lifecycle.is_deleted());
        assert!(service.soft_delete(&deleted).unwrap_err().is_invalid_state());
        assert!(service.list(true).unwrap().iter().all(|p| p.id != payee.id));
    }

    #[test]
    fn test_deleted_payee_is_immutable() {
        let (_temp_dir, storage) = create_test_storage();
        let service = PayeeService::new(&storage);

        let payee = service.save(Payee::new("Gym")).unwrap();
        let hidden = service.hide(&payee).unwrap();
        let mut deleted = service.soft_delete(&hidden).unwrap();
        deleted.description = "Gym 2".into();

        assert!(service.save(deleted).unwrap_err().is_invalid_state());
    }
}
