//! State checks shared by every kind's lifecycle rules
//!
//! Each service runs its own validation and referential lookups, and calls
//! into these helpers for the parts that look the same for every kind:
//! commit stamping, the hide/unhide/delete state machine, and persisting the
//! result together with its audit entry and event.

use chrono::{DateTime, Duration, Utc};

use crate::audit::{AuditEntry, Operation};
use crate::error::{LedgerError, LedgerResult};
use crate::events::LedgerEvent;
use crate::models::{Entity, Lifecycle};
use crate::storage::{Repository, Storage};

/// Timestamp for a new commit, strictly after the previous one
pub(crate) fn stamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous {
        Some(prev) if prev >= now => prev + Duration::milliseconds(1),
        _ => now,
    }
}

pub(crate) fn not_found<T: Entity>(id: T::Id) -> LedgerError {
    LedgerError::NotFound {
        entity_type: T::KIND.label(),
        identifier: id.to_string(),
    }
}

pub(crate) fn invalid_state<T: Entity>(id: T::Id, reason: &str) -> LedgerError {
    LedgerError::invalid_state(T::KIND.label(), id.to_string(), reason)
}

pub(crate) fn conflict<T: Entity>(id: T::Id, reason: impl Into<String>) -> LedgerError {
    LedgerError::conflict(T::KIND.label(), id.to_string(), reason)
}

/// Fail with `Conflict` if `count` rows still reference the entity
pub(crate) fn ensure_unreferenced<T: Entity>(id: T::Id, count: usize, what: &str) -> LedgerResult<()> {
    if count > 0 {
        return Err(conflict::<T>(
            id,
            format!("still referenced by {} {}", count, what),
        ));
    }
    Ok(())
}

/// Checks every Save shares; returns the stored copy when updating
///
/// A draft must not reuse an existing id. An update must target a stored,
/// non-deleted, mutable row.
pub(crate) fn check_save<T: Entity>(
    repo: &Repository<T>,
    entity: &T,
    immutable: bool,
) -> LedgerResult<Option<T>> {
    if entity.is_new() {
        if repo.exists(entity.id())? {
            return Err(conflict::<T>(entity.id(), "id is already in use"));
        }
        return Ok(None);
    }

    let stored = repo
        .get(entity.id())?
        .ok_or_else(|| not_found::<T>(entity.id()))?;

    if stored.is_deleted() {
        return Err(invalid_state::<T>(entity.id(), "deleted entities are immutable"));
    }
    if immutable {
        return Err(conflict::<T>(entity.id(), "well-known entities are immutable"));
    }

    Ok(Some(stored))
}

/// Stamp a save
///
/// Drafts get `created_at`. Updates keep the stored lifecycle, so a save can
/// never hide, unhide or delete on its own.
pub(crate) fn commit<T: Entity>(mut entity: T, stored: Option<&T>) -> T {
    let lifecycle = match stored {
        None => Lifecycle::committed(stamp(None)),
        Some(stored) => {
            let mut lifecycle = stored.lifecycle().clone();
            lifecycle.modified_at = Some(stamp(stored.modified_at()));
            lifecycle
        }
    };
    *entity.lifecycle_mut() = lifecycle;
    entity
}

/// Look up the stored copy for a hide/unhide/delete
///
/// The caller's copy only decides whether it is a draft; every other state
/// check reads the stored row.
pub(crate) fn load_committed<T: Entity>(repo: &Repository<T>, entity: &T) -> LedgerResult<T> {
    if entity.is_new() {
        return Err(invalid_state::<T>(entity.id(), "entity has not been saved"));
    }

    let stored = repo
        .get(entity.id())?
        .ok_or_else(|| not_found::<T>(entity.id()))?;

    if stored.is_deleted() {
        return Err(invalid_state::<T>(entity.id(), "entity is already deleted"));
    }

    Ok(stored)
}

pub(crate) fn hide<T: Entity>(repo: &Repository<T>, entity: &T, immutable: bool) -> LedgerResult<(T, T)> {
    let stored = load_committed(repo, entity)?;

    if stored.is_hidden() {
        return Err(invalid_state::<T>(entity.id(), "entity is already hidden"));
    }
    if immutable {
        return Err(conflict::<T>(entity.id(), "well-known entities cannot be hidden"));
    }

    let mut hidden = stored.clone();
    let now = stamp(stored.modified_at());
    hidden.lifecycle_mut().hide(now);
    Ok((stored, hidden))
}

pub(crate) fn unhide<T: Entity>(repo: &Repository<T>, entity: &T) -> LedgerResult<(T, T)> {
    let stored = load_committed(repo, entity)?;

    if !stored.is_hidden() {
        return Err(invalid_state::<T>(entity.id(), "entity is not hidden"));
    }

    let mut shown = stored.clone();
    let now = stamp(stored.modified_at());
    shown.lifecycle_mut().unhide(now);
    Ok((stored, shown))
}

/// State checks for a soft delete, before the kind's referential checks
pub(crate) fn check_delete<T: Entity>(
    repo: &Repository<T>,
    entity: &T,
    immutable: bool,
    require_hidden: bool,
) -> LedgerResult<T> {
    let stored = load_committed(repo, entity)?;

    if immutable {
        return Err(conflict::<T>(entity.id(), "well-known entities cannot be deleted"));
    }
    if require_hidden && !stored.is_hidden() {
        return Err(conflict::<T>(entity.id(), "entity must be hidden before it is deleted"));
    }

    Ok(stored)
}

pub(crate) fn tombstone<T: Entity>(stored: &T) -> T {
    let mut deleted = stored.clone();
    let now = stamp(stored.modified_at());
    deleted.lifecycle_mut().delete(now);
    deleted
}

/// Store a committed row, then audit it and announce it
///
/// If the file write or the audit entry fails, the in-memory row is put
/// back to `before`.
pub(crate) fn persist<T: Entity>(
    storage: &Storage,
    repo: &Repository<T>,
    operation: Operation,
    before: Option<&T>,
    after: &T,
) -> LedgerResult<()> {
    {
        let _gate = storage.commit_gate()?;
        repo.upsert(after.clone())?;
        let written = repo
            .save()
            .and_then(|()| storage.log_audit(&AuditEntry::lifecycle(operation, before, after)));

        // The caller sees an error, so memory must not keep the row
        if let Err(err) = written {
            repo.restore(after.id(), before.cloned())?;
            if let Err(restore_err) = repo.save() {
                tracing::error!(error = %restore_err, "re-persisting after a failed commit failed");
            }
            return Err(err);
        }
    }

    let (kind, id) = (T::KIND, after.id().to_string());
    tracing::debug!(%kind, %id, %operation, "lifecycle operation committed");

    let event = match operation {
        Operation::Hide => LedgerEvent::Hidden { kind, id },
        Operation::Unhide => LedgerEvent::Unhidden { kind, id },
        Operation::Delete => LedgerEvent::Deleted { kind, id },
        Operation::Create | Operation::Update | Operation::Merge => LedgerEvent::Saved { kind, id },
    };
    storage.events().publish(event);

    Ok(())
}

/// Audit operation for a save
pub(crate) fn save_operation<T>(stored: Option<&T>) -> Operation {
    if stored.is_some() {
        Operation::Update
    } else {
        Operation::Create
    }
}
