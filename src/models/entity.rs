//! Lifecycle fields shared by every entity kind
//!
//! An entity starts as an in-memory draft (`created_at` unset), is committed
//! by the lifecycle rules, may be hidden and unhidden any number of times, and
//! is finally soft-deleted into a tombstone. `modified_at` is refreshed by
//! every committed mutation and is what replicas compare during a merge.

use std::fmt;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// The kinds of entity stored in a ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Account,
    Payee,
    EnvelopeGroup,
    Envelope,
    Transaction,
}

impl EntityKind {
    /// Merge and post-merge check order: parents before the rows that reference them
    pub const MERGE_ORDER: [EntityKind; 5] = [
        Self::Account,
        Self::Payee,
        Self::EnvelopeGroup,
        Self::Envelope,
        Self::Transaction,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Account => "Account",
            Self::Payee => "Payee",
            Self::EnvelopeGroup => "EnvelopeGroup",
            Self::Envelope => "Envelope",
            Self::Transaction => "Transaction",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle timestamps carried by every entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    /// Absent while the entity is a draft
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Last committed mutation, compared during merges
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,

    /// Present on tombstones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,

    /// Present while hidden from normal listings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_at: Option<DateTime<Utc>>,
}

impl Lifecycle {
    /// Lifecycle of an entity that has not been committed yet
    pub fn draft() -> Self {
        Self::default()
    }

    /// Lifecycle of an entity committed at `at`
    pub fn committed(at: DateTime<Utc>) -> Self {
        Self {
            created_at: Some(at),
            modified_at: Some(at),
            deleted_at: None,
            hidden_at: None,
        }
    }

    pub fn is_new(&self) -> bool {
        self.created_at.is_none()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden_at.is_some()
    }

    /// Committed, not deleted and not hidden
    pub fn is_active(&self) -> bool {
        !self.is_new() && !self.is_deleted() && !self.is_hidden()
    }

    /// Stamp a commit: drafts get their creation time, everything gets a fresh `modified_at`
    pub fn commit(&mut self, now: DateTime<Utc>) {
        if self.created_at.is_none() {
            self.created_at = Some(now);
        }
        self.modified_at = Some(now);
    }

    pub fn hide(&mut self, now: DateTime<Utc>) {
        self.hidden_at = Some(now);
        self.modified_at = Some(now);
    }

    pub fn unhide(&mut self, now: DateTime<Utc>) {
        self.hidden_at = None;
        self.modified_at = Some(now);
    }

    pub fn delete(&mut self, now: DateTime<Utc>) {
        self.deleted_at = Some(now);
        self.modified_at = Some(now);
    }
}

/// Common behaviour of the ledger's entity kinds
///
/// Everything generic over entities (repositories, the merge engine, snapshot
/// validation, the lifecycle checks) is written against this trait.
pub trait Entity: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    type Id: Copy
        + Eq
        + Hash
        + Ord
        + fmt::Display
        + fmt::Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    const KIND: EntityKind;

    fn id(&self) -> Self::Id;

    fn lifecycle(&self) -> &Lifecycle;

    fn lifecycle_mut(&mut self) -> &mut Lifecycle;

    /// Human-readable label for audit entries and CLI output
    fn display_name(&self) -> String;

    fn is_new(&self) -> bool {
        self.lifecycle().is_new()
    }

    fn is_deleted(&self) -> bool {
        self.lifecycle().is_deleted()
    }

    fn is_hidden(&self) -> bool {
        self.lifecycle().is_hidden()
    }

    fn is_active(&self) -> bool {
        self.lifecycle().is_active()
    }

    fn modified_at(&self) -> Option<DateTime<Utc>> {
        self.lifecycle().modified_at
    }
}

/// Implements [`Entity`] for a struct with `id`, `lifecycle` and a name-like field
macro_rules! impl_entity {
    ($ty:ty, $id:ty, $kind:expr, |$this:ident| $name:expr) => {
        impl $crate::models::entity::Entity for $ty {
            type Id = $id;

            const KIND: $crate::models::entity::EntityKind = $kind;

            fn id(&self) -> Self::Id {
                self.id
            }

            fn lifecycle(&self) -> &$crate::models::entity::Lifecycle {
                &self.lifecycle
            }

            fn lifecycle_mut(&mut self) -> &mut $crate::models::entity::Lifecycle {
                &mut self.lifecycle
            }

            fn display_name(&self) -> String {
                let $this = self;
                $name
            }
        }
    };
}

pub(crate) use impl_entity;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_draft_is_not_active() {
        let lifecycle = Lifecycle::draft();
        assert!(lifecycle.is_new());
        assert!(!lifecycle.is_active());
    }

    #[test]
    fn test_active_iff_committed_not_deleted_not_hidden() {
        let mut lifecycle = Lifecycle::draft();
        lifecycle.commit(at(10));
        assert!(lifecycle.is_active());
        assert_eq!(lifecycle.created_at, Some(at(10)));

        lifecycle.hide(at(20));
        assert!(!lifecycle.is_active());
        assert_eq!(lifecycle.modified_at, Some(at(20)));

        lifecycle.unhide(at(30));
        assert!(lifecycle.is_active());

        lifecycle.delete(at(40));
        assert!(!lifecycle.is_active());
        assert!(lifecycle.is_deleted());
    }

    #[test]
    fn test_commit_keeps_creation_time() {
        let mut lifecycle = Lifecycle::committed(at(5));
        lifecycle.commit(at(50));
        assert_eq!(lifecycle.created_at, Some(at(5)));
        assert_eq!(lifecycle.modified_at, Some(at(50)));
    }

    #[test]
    fn test_draft_serializes_without_timestamps() {
        let json = serde_json::to_string(&Lifecycle::draft()).unwrap();
        assert_eq!(json, "{}");
    }
}
