//! Storage initialization
//!
//! Seeds the well-known entities. Seeded rows carry a fixed creation time,
//! so two replicas initialized independently hold identical copies and a
//! merge never sees them differ.

use crate::error::LedgerResult;
use crate::models::well_known::{seed_envelopes, seed_groups, seed_payees};
use crate::models::Entity;

use super::repository::Repository;
use super::Storage;

/// Seed the well-known rows that are missing and persist
///
/// Existing rows are never overwritten.
pub fn initialize_storage(storage: &Storage) -> LedgerResult<usize> {
    storage.paths().ensure_directories()?;

    let seeded = seed_missing(&storage.payees, seed_payees())?
        + seed_missing(&storage.envelope_groups, seed_groups())?
        + seed_missing(&storage.envelopes, seed_envelopes())?;

    if seeded > 0 {
        tracing::info!(seeded, "seeded well-known entities");
        storage.save_all()?;
    }

    Ok(seeded)
}

/// True if any well-known row is missing
pub fn needs_initialization(storage: &Storage) -> LedgerResult<bool> {
    for payee in seed_payees() {
        if !storage.payees.exists(payee.id)? {
            return Ok(true);
        }
    }
    for group in seed_groups() {
        if !storage.envelope_groups.exists(group.id)? {
            return Ok(true);
        }
    }
    for envelope in seed_envelopes() {
        if !storage.envelopes.exists(envelope.id)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn seed_missing<T: Entity>(repo: &Repository<T>, seeds: Vec<T>) -> LedgerResult<usize> {
    let mut seeded = 0;
    for entity in seeds {
        if !repo.exists(entity.id())? {
            repo.upsert(entity)?;
            seeded += 1;
        }
    }
    Ok(seeded)
}
