//! The full entity set of one replica
//!
//! A `Ledger` is what the store exports, what a snapshot carries, and what
//! the merge engine consumes and produces.

use serde::{Deserialize, Serialize};

use super::entity::Entity;
use super::{Account, Envelope, EnvelopeGroup, Payee, Transaction};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub payees: Vec<Payee>,
    #[serde(default)]
    pub envelope_groups: Vec<EnvelopeGroup>,
    #[serde(default)]
    pub envelopes: Vec<Envelope>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Ledger {
    /// Sort every kind by id, the canonical order for files and snapshots
    pub fn sort(&mut self) {
        sort_by_id(&mut self.accounts);
        sort_by_id(&mut self.payees);
        sort_by_id(&mut self.envelope_groups);
        sort_by_id(&mut self.envelopes);
        sort_by_id(&mut self.transactions);
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
            + self.payees.len()
            + self.envelope_groups.len()
            + self.envelopes.len()
            + self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if any kind holds an uncommitted draft
    pub fn has_drafts(&self) -> bool {
        self.accounts.iter().any(Entity::is_new)
            || self.payees.iter().any(Entity::is_new)
            || self.envelope_groups.iter().any(Entity::is_new)
            || self.envelopes.iter().any(Entity::is_new)
            || self.transactions.iter().any(Entity::is_new)
    }
}

pub(crate) fn sort_by_id<T: Entity>(items: &mut [T]) {
    items.sort_by_key(|item| item.id());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountType;
    use chrono::Utc;

    #[test]
    fn test_sort_and_drafts() {
        let mut ledger = Ledger::default();
        assert!(ledger.is_empty());

        let mut a = Account::new("A", AccountType::Checking);
        let mut b = Account::new("B", AccountType::Savings);
        a.lifecycle.commit(Utc::now());
        ledger.accounts = vec![a.clone(), b.clone()];
        assert!(ledger.has_drafts());

        b.lifecycle.commit(Utc::now());
        ledger.accounts = vec![a, b];
        assert!(!ledger.has_drafts());

        ledger.sort();
        assert!(ledger.accounts[0].id < ledger.accounts[1].id);
        assert_eq!(ledger.len(), 2);
    }
}
