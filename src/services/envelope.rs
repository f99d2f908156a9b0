//! Envelope service
//!
//! Lifecycle rules for envelope groups and the envelopes filed under them.

use crate::audit::Operation;
use crate::error::{LedgerError, LedgerResult};
use crate::models::well_known::{is_system_envelope, is_well_known_envelope, is_well_known_group};
use crate::models::{Envelope, EnvelopeGroup, EnvelopeGroupId, EnvelopeId};
use crate::storage::Storage;

use super::lifecycle;

/// Service for envelope and group management
pub struct EnvelopeService<'a> {
    storage: &'a Storage,
}

impl<'a> EnvelopeService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    // === Groups ===

    pub fn save_group(&self, group: EnvelopeGroup) -> LedgerResult<EnvelopeGroup> {
        group
            .validate()
            .map_err(|e| LedgerError::Invalid(e.to_string()))?;

        let repo = &self.storage.envelope_groups;
        let stored = lifecycle::check_save(repo, &group, is_well_known_group(group.id))?;

        let saved = lifecycle::commit(group, stored.as_ref());
        lifecycle::persist(
            self.storage,
            repo,
            lifecycle::save_operation(stored.as_ref()),
            stored.as_ref(),
            &saved,
        )?;
        Ok(saved)
    }

    pub fn hide_group(&self, group: &EnvelopeGroup) -> LedgerResult<EnvelopeGroup> {
        let repo = &self.storage.envelope_groups;
        let (before, hidden) = lifecycle::hide(repo, group, is_well_known_group(group.id))?;
        lifecycle::persist(self.storage, repo, Operation::Hide, Some(&before), &hidden)?;
        Ok(hidden)
    }

    pub fn unhide_group(&self, group: &EnvelopeGroup) -> LedgerResult<EnvelopeGroup> {
        let repo = &self.storage.envelope_groups;
        let (before, shown) = lifecycle::unhide(repo, group)?;
        lifecycle::persist(self.storage, repo, Operation::Unhide, Some(&before), &shown)?;
        Ok(shown)
    }

    /// Delete a hidden group once every envelope in it is deleted
    pub fn delete_group(&self, group: &EnvelopeGroup) -> LedgerResult<EnvelopeGroup> {
        let repo = &self.storage.envelope_groups;
        let stored = lifecycle::check_delete(repo, group, is_well_known_group(group.id), true)?;

        let envelopes = self.storage.active_envelopes_in_group(stored.id)?;
        lifecycle::ensure_unreferenced::<EnvelopeGroup>(stored.id, envelopes.len(), "envelopes")?;

        let deleted = lifecycle::tombstone(&stored);
        lifecycle::persist(self.storage, repo, Operation::Delete, Some(&stored), &deleted)?;
        Ok(deleted)
    }

    pub fn get_group(&self, id: EnvelopeGroupId) -> LedgerResult<Option<EnvelopeGroup>> {
        self.storage.envelope_groups.get(id)
    }

    /// Find a non-deleted group by description (case-insensitive) or id
    pub fn find_group(&self, identifier: &str) -> LedgerResult<Option<EnvelopeGroup>> {
        let needle = identifier.trim();
        let lower = needle.to_lowercase();
        let matches = self.storage.envelope_groups.find(|g| {
            !g.lifecycle.is_deleted()
                && (g.description.to_lowercase() == lower || g.id.to_string() == needle)
        })?;
        if let Some(group) = matches.into_iter().next() {
            return Ok(Some(group));
        }

        match needle.parse::<EnvelopeGroupId>() {
            Ok(id) => self.storage.envelope_groups.get(id),
            Err(_) => Ok(None),
        }
    }

    pub fn list_groups(&self, include_hidden: bool) -> LedgerResult<Vec<EnvelopeGroup>> {
        let mut groups = self.storage.envelope_groups.find(|g| {
            !g.lifecycle.is_deleted() && (include_hidden || !g.lifecycle.is_hidden())
        })?;
        groups.sort_by_key(|g| g.description.to_lowercase());
        Ok(groups)
    }

    // === Envelopes ===

    /// Commit an envelope; its group must exist and not be deleted
    pub fn save_envelope(&self, envelope: Envelope) -> LedgerResult<Envelope> {
        envelope
            .validate()
            .map_err(|e| LedgerError::Invalid(e.to_string()))?;

        let repo = &self.storage.envelopes;
        let stored = lifecycle::check_save(repo, &envelope, is_well_known_envelope(envelope.id))?;

        match self.storage.envelope_groups.get(envelope.group_id)? {
            Some(group) if !group.lifecycle.is_deleted() => {}
            Some(_) => {
                return Err(LedgerError::Invalid(format!(
                    "envelope group {} has been deleted",
                    envelope.group_id
                )))
            }
            None => {
                return Err(LedgerError::Invalid(format!(
                    "envelope group {} does not exist",
                    envelope.group_id
                )))
            }
        }

        let saved = lifecycle::commit(envelope, stored.as_ref());
        lifecycle::persist(
            self.storage,
            repo,
            lifecycle::save_operation(stored.as_ref()),
            stored.as_ref(),
            &saved,
        )?;
        Ok(saved)
    }

    pub fn hide_envelope(&self, envelope: &Envelope) -> LedgerResult<Envelope> {
        let repo = &self.storage.envelopes;
        let (before, hidden) = lifecycle::hide(repo, envelope, is_well_known_envelope(envelope.id))?;
        lifecycle::persist(self.storage, repo, Operation::Hide, Some(&before), &hidden)?;
        Ok(hidden)
    }

    pub fn unhide_envelope(&self, envelope: &Envelope) -> LedgerResult<Envelope> {
        let repo = &self.storage.envelopes;
        let (before, shown) = lifecycle::unhide(repo, envelope)?;
        lifecycle::persist(self.storage, repo, Operation::Unhide, Some(&before), &shown)?;
        Ok(shown)
    }

    /// Delete a hidden envelope that no transaction uses
    pub fn delete_envelope(&self, envelope: &Envelope) -> LedgerResult<Envelope> {
        let repo = &self.storage.envelopes;
        let system = match repo.get(envelope.id)? {
            Some(stored) => is_system_envelope(&stored),
            None => is_well_known_envelope(envelope.id),
        };
        let stored = lifecycle::check_delete(repo, envelope, system, true)?;

        let referencing = self.storage.active_transactions_for_envelope(stored.id)?;
        lifecycle::ensure_unreferenced::<Envelope>(stored.id, referencing.len(), "transactions")?;

        let deleted = lifecycle::tombstone(&stored);
        lifecycle::persist(self.storage, repo, Operation::Delete, Some(&stored), &deleted)?;
        Ok(deleted)
    }

    pub fn get_envelope(&self, id: EnvelopeId) -> LedgerResult<Option<Envelope>> {
        self.storage.envelopes.get(id)
    }

    /// Find a non-deleted envelope by description (case-insensitive) or id
    pub fn find_envelope(&self, identifier: &str) -> LedgerResult<Option<Envelope>> {
        let needle = identifier.trim();
        let lower = needle.to_lowercase();
        let matches = self.storage.envelopes.find(|e| {
            !e.lifecycle.is_deleted()
                && (e.description.to_lowercase() == lower || e.id.to_string() == needle)
        })?;
        if let Some(envelope) = matches.into_iter().next() {
            return Ok(Some(envelope));
        }

        match needle.parse::<EnvelopeId>() {
            Ok(id) => self.storage.envelopes.get(id),
            Err(_) => Ok(None),
        }
    }

    /// List envelopes, optionally restricted to one group
    pub fn list_envelopes(
        &self,
        group_id: Option<EnvelopeGroupId>,
        include_hidden: bool,
    ) -> LedgerResult<Vec<Envelope>> {
        let mut envelopes = self.storage.envelopes.find(|e| {
            !e.lifecycle.is_deleted()
                && (include_hidden || !e.lifecycle.is_hidden())
                && group_id.map_or(true, |g| e.group_id == g)
        })?;
        envelopes.sort_by_key(|e| e.description.to_lowercase());
        Ok(envelopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::paths::LedgerPaths;
    use crate::models::well_known::{IGNORED_ENVELOPE, INCOME_ENVELOPE, SYSTEM_GROUP};
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
    fn test_envelope_needs_live_group() {
        let (_temp_dir, storage) = create_test_storage();
        let service = EnvelopeService::new(&storage);

        let err = service
            .save_envelope(Envelope::new("Rent", EnvelopeGroupId::new()))
            .unwrap_err();
        assert!(err.is_invalid());

        let group = service.save_group(EnvelopeGroup::new("Bills")).unwrap();
        let rent = service
            .save_envelope(Envelope::new("Rent", group.id))
            .unwrap();
        assert_eq!(rent.group_id, group.id);
    }

    #[test]
    fn test_group_with_envelopes_cannot_be_deleted() {
        let (_temp_dir, storage) = create_test_storage();
        let service = EnvelopeService::new(&storage);

        let group = service.save_group(EnvelopeGroup::new("Bills")).unwrap();
        let rent = service
            .save_envelope(Envelope::new("Rent", group.id))
            .unwrap();
        let group = service.hide_group(&group).unwrap();

        assert!(service.delete_group(&group).unwrap_err().is_conflict());

        let rent = service.hide_envelope(&rent).unwrap();
        service.delete_envelope(&rent).unwrap();
        assert!(service.delete_group(&group).unwrap().lifecycle.is_deleted());
    }

    #[test]
    fn test_well_known_envelopes_are_protected() {
        let (_temp_dir, storage) = create_test_storage();
        let service = EnvelopeService::new(&storage);

        let income = service.get_envelope(INCOME_ENVELOPE).unwrap().unwrap();
        assert!(service.hide_envelope(&income).unwrap_err().is_conflict());
        assert!(service.delete_envelope(&income).unwrap_err().is_conflict());

        let ignored = service.get_envelope(IGNORED_ENVELOPE).unwrap().unwrap();
        assert!(service.delete_envelope(&ignored).unwrap_err().is_conflict());
    }

    #[test]
    fn test_user_envelope_in_system_group_cannot_be_deleted() {
        let (_temp_dir, storage) = create_test_storage();
        let service = EnvelopeService::new(&storage);

        let adjustments = service
            .save_envelope(Envelope::new("Adjustments", SYSTEM_GROUP))
            .unwrap();
        let hidden = service.hide_envelope(&adjustments).unwrap();

        assert!(service.delete_envelope(&hidden).unwrap_err().is_conflict());
    }

    #[test]
    fn test_list_envelopes_by_group() {
        let (_temp_dir, storage) = create_test_storage();
        let service = EnvelopeService::new(&storage);

        let group = service.save_group(EnvelopeGroup::new("Bills")).unwrap();
        service
            .save_envelope(Envelope::new("Rent", group.id))
            .unwrap();
        service
            .save_envelope(Envelope::new("Power", group.id))
            .unwrap();

        let listed = service.list_envelopes(Some(group.id), false).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].description, "Power");
        assert_eq!(
            service.find_envelope("rent").unwrap().unwrap().group_id,
            group.id
        );
    }
}
