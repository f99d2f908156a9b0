//! Generic entity repository for JSON storage
//!
//! One repository per entity kind, each backed by its own file of the form
//! `{"entities": [...]}`. Rows are kept in memory behind an `RwLock` and
//! written back sorted by id.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::models::ledger::sort_by_id;
use crate::models::Entity;

use super::file_io::{read_json, write_json_atomic};

#[derive(Debug, Serialize, Deserialize)]
#[serde(bound = "T: Entity")]
struct EntityFile<T> {
    #[serde(default)]
    entities: Vec<T>,
}

impl<T> Default for EntityFile<T> {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
        }
    }
}

/// Repository for one entity kind
pub struct Repository<T: Entity> {
    path: PathBuf,
    data: RwLock<HashMap<T::Id, T>>,
}

impl<T: Entity> Repository<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<T::Id, T>>, LedgerError> {
        self.data
            .read()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<T::Id, T>>, LedgerError> {
        self.data
            .write()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire write lock: {}", e)))
    }

    /// Load rows from disk, replacing whatever is in memory
    pub fn load(&self) -> Result<(), LedgerError> {
        let file: EntityFile<T> = read_json(&self.path)?;

        let mut data = self.write()?;
        data.clear();
        data.extend(file.entities.into_iter().map(|e| (e.id(), e)));
        Ok(())
    }

    /// Write the in-memory rows to disk
    pub fn save(&self) -> Result<(), LedgerError> {
        let file = EntityFile {
            entities: self.snapshot()?,
        };
        write_json_atomic(&self.path, &file)
    }

    pub fn get(&self, id: T::Id) -> Result<Option<T>, LedgerError> {
        Ok(self.read()?.get(&id).cloned())
    }

    pub fn exists(&self, id: T::Id) -> Result<bool, LedgerError> {
        Ok(self.read()?.contains_key(&id))
    }

    /// All rows, tombstones and hidden rows included
    pub fn get_all(&self) -> Result<Vec<T>, LedgerError> {
        self.snapshot()
    }

    /// Rows that are neither hidden nor deleted
    pub fn get_active(&self) -> Result<Vec<T>, LedgerError> {
        Ok(self
            .snapshot()?
            .into_iter()
            .filter(|e| e.is_active())
            .collect())
    }

    /// Rows matching a predicate
    pub fn find<F>(&self, predicate: F) -> Result<Vec<T>, LedgerError>
    where
        F: Fn(&T) -> bool,
    {
        let mut found: Vec<T> = self
            .read()?
            .values()
            .filter(|e| predicate(e))
            .cloned()
            .collect();
        sort_by_id(&mut found);
        Ok(found)
    }

    /// Insert or replace a committed row in memory
    pub fn upsert(&self, entity: T) -> Result<(), LedgerError> {
        if entity.is_new() {
            return Err(LedgerError::Storage(format!(
                "Refusing to store draft {} {}",
                T::KIND,
                entity.id()
            )));
        }
        self.write()?.insert(entity.id(), entity);
        Ok(())
    }

    /// Put `previous` back under `id`, or drop the row when there was none
    pub(crate) fn restore(&self, id: T::Id, previous: Option<T>) -> Result<(), LedgerError> {
        let mut data = self.write()?;
        match previous {
            Some(entity) => {
                data.insert(id, entity);
            }
            None => {
                data.remove(&id);
            }
        }
        Ok(())
    }

    pub fn count(&self) -> Result<usize, LedgerError> {
        Ok(self.read()?.len())
    }

    /// Copy of every row, sorted by id
    pub fn snapshot(&self) -> Result<Vec<T>, LedgerError> {
        let mut all: Vec<T> = self.read()?.values().cloned().collect();
        sort_by_id(&mut all);
        Ok(all)
    }

    /// Swap the in-memory rows, returning the previous ones
    pub fn replace_all(&self, entities: Vec<T>) -> Result<Vec<T>, LedgerError> {
        let mut data = self.write()?;
        let mut previous: Vec<T> = data.drain().map(|(_, e)| e).collect();
        sort_by_id(&mut previous);
        data.extend(entities.into_iter().map(|e| (e.id(), e)));
        Ok(previous)
    }
}
