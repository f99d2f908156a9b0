//! Replica merge
//!
//! Each kind is merged independently, id by id. When both replicas hold a
//! row the whole record with the greater merge stamp wins:
//!
//! - later `modified_at` first,
//! - on equal times a tombstone beats a live row,
//! - then the canonical JSON bytes, so the choice never depends on which
//!   side is local.
//!
//! The join is commutative, associative and idempotent. After the per-kind
//! merges the combined ledger is checked for split groups that lost members
//! on another replica and for rows whose parents are missing.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::LedgerResult;
use crate::models::{Entity, EntityKind, Ledger, PayeeId, SplitId, Transaction};

/// Per-kind merge counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindStats {
    /// Present on both sides, local row kept (identical rows included)
    pub kept_local: usize,
    /// Present on both sides, remote row won
    pub taken_remote: usize,
    pub local_only: usize,
    pub remote_only: usize,
    pub dropped_drafts: usize,
}

impl KindStats {
    /// Rows the local replica did not already hold in this form
    pub fn incoming(&self) -> usize {
        self.taken_remote + self.remote_only
    }
}

impl fmt::Display for KindStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "kept {} / took {} remote / {} local-only / {} remote-only",
            self.kept_local, self.taken_remote, self.local_only, self.remote_only
        )?;
        if self.dropped_drafts > 0 {
            write!(f, " / dropped {} drafts", self.dropped_drafts)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub accounts: KindStats,
    pub payees: KindStats,
    pub envelope_groups: KindStats,
    pub envelopes: KindStats,
    pub transactions: KindStats,
}

impl MergeStats {
    /// Stats in merge order
    pub fn iter(&self) -> impl Iterator<Item = (EntityKind, &KindStats)> {
        EntityKind::MERGE_ORDER.into_iter().zip([
            &self.accounts,
            &self.payees,
            &self.envelope_groups,
            &self.envelopes,
            &self.transactions,
        ])
    }
}

/// Merged rows of one kind
#[derive(Debug, Clone)]
pub struct MergeResult<T> {
    pub merged: Vec<T>,
    pub stats: KindStats,
}

/// A row whose parent is absent from the merged ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orphan {
    pub kind: EntityKind,
    pub id: String,
    pub missing: EntityKind,
    pub missing_id: String,
}

impl fmt::Display for Orphan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} references missing {} {}",
            self.kind, self.id, self.missing, self.missing_id
        )
    }
}

/// Outcome of merging two whole ledgers
#[derive(Debug, Clone)]
pub struct LedgerMerge {
    pub ledger: Ledger,
    pub stats: MergeStats,
    /// Split groups dissolved because only one live member survived
    pub repaired_splits: Vec<SplitId>,
    pub orphans: Vec<Orphan>,
}

type MergeStamp = (Option<DateTime<Utc>>, bool, Vec<u8>);

fn merge_stamp<T: Entity>(entity: &T) -> LedgerResult<MergeStamp> {
    Ok((
        entity.modified_at(),
        entity.is_deleted(),
        serde_json::to_vec(entity)?,
    ))
}

fn index<T: Entity>(entities: Vec<T>, drafts: &mut usize) -> BTreeMap<T::Id, T> {
    let mut by_id = BTreeMap::new();
    for entity in entities {
        if entity.is_new() {
            *drafts += 1;
            continue;
        }
        // Duplicate ids within one side keep the greater row
        match by_id.get(&entity.id()) {
            Some(existing) if later_or_equal(existing, &entity) => {}
            _ => {
                by_id.insert(entity.id(), entity);
            }
        }
    }
    by_id
}

fn later_or_equal<T: Entity>(a: &T, b: &T) -> bool {
    match (merge_stamp(a), merge_stamp(b)) {
        (Ok(a), Ok(b)) => a >= b,
        _ => a.modified_at() >= b.modified_at(),
    }
}

/// Merge one kind, returning rows sorted by id
pub fn merge_entities<T: Entity>(local: Vec<T>, remote: Vec<T>) -> LedgerResult<MergeResult<T>> {
    let mut stats = KindStats::default();
    let mut local = index(local, &mut stats.dropped_drafts);
    let remote = index(remote, &mut stats.dropped_drafts);

    let mut merged = Vec::with_capacity(local.len().max(remote.len()));
    for (id, theirs) in remote {
        match local.remove(&id) {
            Some(ours) => {
                if merge_stamp(&ours)? >= merge_stamp(&theirs)? {
                    stats.kept_local += 1;
                    merged.push(ours);
                } else {
                    stats.taken_remote += 1;
                    merged.push(theirs);
                }
            }
            None => {
                stats.remote_only += 1;
                merged.push(theirs);
            }
        }
    }
    stats.local_only = local.len();
    merged.extend(local.into_values());
    merged.sort_by_key(|entity| entity.id());

    if stats.dropped_drafts > 0 {
        warn!(kind = %T::KIND, drafts = stats.dropped_drafts, "dropped drafts during merge");
    }

    Ok(MergeResult { merged, stats })
}

/// Merge two ledgers kind by kind, then repair and check the result
pub fn merge_ledgers(local: Ledger, remote: Ledger) -> LedgerResult<LedgerMerge> {
    let accounts = merge_entities(local.accounts, remote.accounts)?;
    let payees = merge_entities(local.payees, remote.payees)?;
    let envelope_groups = merge_entities(local.envelope_groups, remote.envelope_groups)?;
    let envelopes = merge_entities(local.envelopes, remote.envelopes)?;
    let mut transactions = merge_entities(local.transactions, remote.transactions)?;

    let repaired_splits = repair_splits(&mut transactions.merged);

    let ledger = Ledger {
        accounts: accounts.merged,
        payees: payees.merged,
        envelope_groups: envelope_groups.merged,
        envelopes: envelopes.merged,
        transactions: transactions.merged,
    };

    let orphans = find_orphans(&ledger);
    for orphan in &orphans {
        warn!(%orphan, "orphaned row after merge");
    }

    let stats = MergeStats {
        accounts: accounts.stats,
        payees: payees.stats,
        envelope_groups: envelope_groups.stats,
        envelopes: envelopes.stats,
        transactions: transactions.stats,
    };
    for (kind, kind_stats) in stats.iter() {
        debug!(%kind, stats = %kind_stats, "merged kind");
    }

    Ok(LedgerMerge {
        ledger,
        stats,
        repaired_splits,
        orphans,
    })
}

/// Dissolve split groups that one replica's deletes left with a single
/// live member
///
/// The survivor is stamped with the latest `modified_at` in the group so
/// every replica computes the same repair. Groups that never lost a member
/// are left alone.
fn repair_splits(transactions: &mut [Transaction]) -> Vec<SplitId> {
    let mut groups: BTreeMap<SplitId, (Vec<usize>, usize, Option<DateTime<Utc>>)> =
        BTreeMap::new();
    for (position, txn) in transactions.iter().enumerate() {
        if let Some(split_id) = txn.split_id {
            let (live, deleted, latest) = groups.entry(split_id).or_default();
            if txn.lifecycle.is_deleted() {
                *deleted += 1;
            } else {
                live.push(position);
            }
            *latest = (*latest).max(txn.lifecycle.modified_at);
        }
    }

    let mut repaired = Vec::new();
    for (split_id, (live, deleted, latest)) in groups {
        if live.len() != 1 || deleted == 0 {
            continue;
        }
        let survivor = &mut transactions[live[0]];
        survivor.split_id = None;
        survivor.lifecycle.modified_at = latest;
        debug!(%split_id, id = %survivor.id, "repaired split after merge");
        repaired.push(split_id);
    }
    repaired
}

fn find_orphans(ledger: &Ledger) -> Vec<Orphan> {
    let accounts: BTreeSet<_> = ledger.accounts.iter().map(|a| a.id).collect();
    let payees: BTreeSet<_> = ledger.payees.iter().map(|p| p.id).collect();
    let groups: BTreeSet<_> = ledger.envelope_groups.iter().map(|g| g.id).collect();
    let envelopes: BTreeSet<_> = ledger.envelopes.iter().map(|e| e.id).collect();
    let transfer_payees: BTreeSet<PayeeId> = accounts.iter().copied().map(PayeeId::from).collect();

    let mut orphans = Vec::new();

    for envelope in ledger.envelopes.iter().filter(|e| !e.lifecycle.is_deleted()) {
        if !groups.contains(&envelope.group_id) {
            orphans.push(Orphan {
                kind: EntityKind::Envelope,
                id: envelope.id.to_string(),
                missing: EntityKind::EnvelopeGroup,
                missing_id: envelope.group_id.to_string(),
            });
        }
    }

    for txn in ledger.transactions.iter().filter(|t| !t.lifecycle.is_deleted()) {
        let mut report = |missing: EntityKind, missing_id: String| {
            orphans.push(Orphan {
                kind: EntityKind::Transaction,
                id: txn.id.to_string(),
                missing,
                missing_id,
            })
        };

        if !accounts.contains(&txn.account_id) {
            report(EntityKind::Account, txn.account_id.to_string());
        }
        if !payees.contains(&txn.payee_id) && !transfer_payees.contains(&txn.payee_id) {
            report(EntityKind::Payee, txn.payee_id.to_string());
        }
        if let Some(envelope_id) = txn.envelope_id {
            if !envelopes.contains(&envelope_id) {
                report(EntityKind::Envelope, envelope_id.to_string());
            }
        }
    }

    orphans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, AccountType, AccountId, EnvelopeGroupId, Money, Payee};
    use chrono::{NaiveDate, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn payee(name: &str, created: i64) -> Payee {
        let mut payee = Payee::new(name);
        payee.lifecycle.commit(at(created));
        payee
    }

    fn edited(mut payee: Payee, name: &str, when: i64) -> Payee {
        payee.description = name.to_string();
        payee.lifecycle.commit(at(when));
        payee
    }

    #[test]
    fn test_later_edit_wins_in_full() {
        let base = payee("Grocer", 0);
        let ours = edited(base.clone(), "Grocery", 10);
        let mut theirs = edited(base, "Groceries", 20);
        theirs.notes = "weekly".into();

        let result = merge_entities(vec![ours], vec![theirs.clone()]).unwrap();
        assert_eq!(result.merged, vec![theirs]);
        assert_eq!(result.stats.taken_remote, 1);
    }

    #[test]
    fn test_tombstone_wins_ties_and_earlier_edits() {
        let base = payee("Gym", 0);
        let mut deleted = base.clone();
        deleted.lifecycle.delete(at(10));

        let same_time = edited(base.clone(), "Gym & Spa", 10);
        let result = merge_entities(vec![same_time], vec![deleted.clone()]).unwrap();
        assert!(result.merged[0].lifecycle.is_deleted());

        let earlier = edited(base.clone(), "Gym & Spa", 5);
        let result = merge_entities(vec![deleted.clone()], vec![earlier]).unwrap();
        assert!(result.merged[0].lifecycle.is_deleted());
        assert_eq!(result.stats.kept_local, 1);

        let later = edited(base, "Gym & Spa", 15);
        let result = merge_entities(vec![deleted], vec![later]).unwrap();
        assert!(!result.merged[0].lifecycle.is_deleted());
    }

    #[test]
    fn test_one_sided_rows_and_drafts() {
        let ours = payee("Local", 1);
        let theirs = payee("Remote", 2);
        let draft = Payee::new("Draft");

        let result = merge_entities(vec![ours, draft], vec![theirs]).unwrap();
        assert_eq!(result.merged.len(), 2);
        assert_eq!(result.stats.local_only, 1);
        assert_eq!(result.stats.remote_only, 1);
        assert_eq!(result.stats.dropped_drafts, 1);
    }

    #[test]
    fn test_equal_stamps_resolve_independently_of_side() {
        let base = payee("Cafe", 0);
        let a = edited(base.clone(), "Cafe A", 10);
        let b = edited(base, "Cafe B", 10);

        let ab = merge_entities(vec![a.clone()], vec![b.clone()]).unwrap().merged;
        let ba = merge_entities(vec![b], vec![a]).unwrap().merged;
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_merge_with_self_is_identity() {
        let mut account = Account::new("Checking", AccountType::Checking);
        account.lifecycle.commit(at(0));
        let ledger = Ledger {
            accounts: vec![account],
            payees: vec![payee("A", 1), payee("B", 2)],
            ..Ledger::default()
        };
        let mut expected = ledger.clone();
        expected.sort();

        let merge = merge_ledgers(ledger.clone(), ledger).unwrap();
        assert_eq!(merge.ledger, expected);
        assert!(merge.repaired_splits.is_empty());
        assert!(merge.stats.iter().all(|(_, s)| s.incoming() == 0));
    }

    fn split_member(account: AccountId, split: SplitId, cents: i64, when: i64) -> Transaction {
        let mut txn = Transaction::new(
            account,
            PayeeId::new(),
            None,
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            Money::from_cents(cents),
        )
        .with_split(split);
        txn.lifecycle.commit(at(when));
        txn
    }

    #[test]
    fn test_split_left_with_one_member_is_repaired() {
        let account = AccountId::new();
        let split = SplitId::new();
        let first = split_member(account, split, -100, 1);
        let second = split_member(account, split, -200, 2);

        // The remote never saw the local delete
        let mut first_deleted = first.clone();
        first_deleted.lifecycle.delete(at(10));
        let local = Ledger {
            transactions: vec![first_deleted, second.clone()],
            ..Ledger::default()
        };
        let remote = Ledger {
            transactions: vec![first, second.clone()],
            ..Ledger::default()
        };

        let merge = merge_ledgers(local, remote).unwrap();
        assert_eq!(merge.repaired_splits, vec![split]);
        let survivor = merge
            .ledger
            .transactions
            .iter()
            .find(|t| t.id == second.id)
            .unwrap();
        assert!(survivor.split_id.is_none());
        assert_eq!(survivor.lifecycle.modified_at, Some(at(10)));

        let again = merge_ledgers(merge.ledger.clone(), merge.ledger.clone()).unwrap();
        assert!(again.repaired_splits.is_empty());
        assert_eq!(again.ledger, merge.ledger);
    }

    #[test]
    fn test_orphans_are_reported_not_removed() {
        let mut envelope = crate::models::Envelope::new("Rent", EnvelopeGroupId::new());
        envelope.lifecycle.commit(at(0));
        let ledger = Ledger {
            envelopes: vec![envelope.clone()],
            ..Ledger::default()
        };

        let merge = merge_ledgers(ledger, Ledger::default()).unwrap();
        assert_eq!(merge.orphans.len(), 1);
        assert_eq!(merge.orphans[0].missing, EntityKind::EnvelopeGroup);
        assert_eq!(merge.ledger.envelopes, vec![envelope]);
    }
}
