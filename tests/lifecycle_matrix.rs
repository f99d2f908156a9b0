//! Lifecycle rules across every entity kind, driven through the services.
//!
//! Run with: `cargo test --test lifecycle_matrix`

use chrono::NaiveDate;
use tempfile::TempDir;

use envelope_ledger::config::LedgerPaths;
use envelope_ledger::models::well_known::{INCOME_ENVELOPE, STARTING_BALANCE_PAYEE, SYSTEM_GROUP};
use envelope_ledger::models::{
    Account, AccountType, Envelope, EnvelopeGroup, Money, Payee, SplitId, Transaction,
};
use envelope_ledger::services::{AccountService, EnvelopeService, PayeeService, TransactionService};
use envelope_ledger::storage::{initialize_storage, Storage};
use envelope_ledger::sync::merge_ledgers;

fn setup() -> (TempDir, Storage) {
    let temp_dir = TempDir::new().unwrap();
    let paths = LedgerPaths::with_base_dir(temp_dir.path().to_path_buf());
    let storage = Storage::open(paths).unwrap();
    initialize_storage(&storage).unwrap();
    (temp_dir, storage)
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
}

struct Fixture {
    account: Account,
    payee: Payee,
    group: EnvelopeGroup,
    envelope: Envelope,
}

fn fixture(storage: &Storage) -> Fixture {
    let account = AccountService::new(storage)
        .save(Account::new("Checking", AccountType::Checking))
        .unwrap();
    let payee = PayeeService::new(storage).save(Payee::new("Grocer")).unwrap();
    let envelopes = EnvelopeService::new(storage);
    let group = envelopes.save_group(EnvelopeGroup::new("Everyday")).unwrap();
    let envelope = envelopes
        .save_envelope(Envelope::new("Groceries", group.id))
        .unwrap();
    Fixture {
        account,
        payee,
        group,
        envelope,
    }
}

fn spend(storage: &Storage, f: &Fixture, cents: i64) -> Transaction {
    TransactionService::new(storage)
        .save(Transaction::new(
            f.account.id,
            f.payee.id,
            Some(f.envelope.id),
            day(),
            Money::from_cents(cents),
        ))
        .unwrap()
}

// =============================================================================
// Drafts
// =============================================================================

#[test]
fn drafts_cannot_change_state() {
    let (_dir, storage) = setup();

    let account = Account::new("Draft", AccountType::Cash);
    let accounts = AccountService::new(&storage);
    assert!(accounts.hide(&account).unwrap_err().is_invalid_state());
    assert!(accounts.soft_delete(&account).unwrap_err().is_invalid_state());

    let payee = Payee::new("Draft");
    let payees = PayeeService::new(&storage);
    assert!(payees.hide(&payee).unwrap_err().is_invalid_state());
    assert!(payees.unhide(&payee).unwrap_err().is_invalid_state());

    let envelopes = EnvelopeService::new(&storage);
    let group = EnvelopeGroup::new("Draft");
    assert!(envelopes.hide_group(&group).unwrap_err().is_invalid_state());
    assert!(envelopes.delete_group(&group).unwrap_err().is_invalid_state());
    let envelope = Envelope::new("Draft", SYSTEM_GROUP);
    assert!(envelopes.hide_envelope(&envelope).unwrap_err().is_invalid_state());

    assert!(storage.ledger().unwrap().accounts.is_empty());
}

// =============================================================================
// Hide / unhide
// =============================================================================

#[test]
fn hide_and_unhide_are_reversible() {
    let (_dir, storage) = setup();
    let f = fixture(&storage);
    let payees = PayeeService::new(&storage);

    let hidden = payees.hide(&f.payee).unwrap();
    assert!(hidden.lifecycle.is_hidden());
    assert!(hidden.lifecycle.modified_at > f.payee.lifecycle.modified_at);
    assert!(payees.hide(&hidden).unwrap_err().is_invalid_state());

    let shown = payees.unhide(&hidden).unwrap();
    assert!(shown.lifecycle.is_active());
    assert!(shown.lifecycle.modified_at > hidden.lifecycle.modified_at);
    assert!(payees.unhide(&shown).unwrap_err().is_invalid_state());

    assert_eq!(shown.description, f.payee.description);
    assert_eq!(shown.lifecycle.created_at, f.payee.lifecycle.created_at);
}

#[test]
fn state_checks_read_the_stored_row() {
    let (_dir, storage) = setup();
    let f = fixture(&storage);
    let accounts = AccountService::new(&storage);

    accounts.hide(&f.account).unwrap();
    // The caller's copy is stale but the stored row is already hidden
    assert!(accounts.hide(&f.account).unwrap_err().is_invalid_state());
    assert!(accounts.soft_delete(&f.account).is_ok());
}

// =============================================================================
// Delete
// =============================================================================

#[test]
fn delete_requires_hidden_first() {
    let (_dir, storage) = setup();
    let f = fixture(&storage);

    assert!(AccountService::new(&storage)
        .soft_delete(&f.account)
        .unwrap_err()
        .is_conflict());
    assert!(PayeeService::new(&storage)
        .soft_delete(&f.payee)
        .unwrap_err()
        .is_conflict());
    let envelopes = EnvelopeService::new(&storage);
    assert!(envelopes.delete_envelope(&f.envelope).unwrap_err().is_conflict());
    assert!(envelopes.delete_group(&f.group).unwrap_err().is_conflict());
}

#[test]
fn delete_refuses_referenced_rows() {
    let (_dir, storage) = setup();
    let f = fixture(&storage);
    spend(&storage, &f, -4_200);

    let accounts = AccountService::new(&storage);
    let account = accounts.hide(&f.account).unwrap();
    assert!(accounts.soft_delete(&account).unwrap_err().is_conflict());

    let payees = PayeeService::new(&storage);
    let payee = payees.hide(&f.payee).unwrap();
    assert!(payees.soft_delete(&payee).unwrap_err().is_conflict());

    let envelopes = EnvelopeService::new(&storage);
    let envelope = envelopes.hide_envelope(&f.envelope).unwrap();
    assert!(envelopes.delete_envelope(&envelope).unwrap_err().is_conflict());

    let group = envelopes.hide_group(&f.group).unwrap();
    assert!(envelopes.delete_group(&group).unwrap_err().is_conflict());
}

#[test]
fn deleted_rows_are_immutable() {
    let (_dir, storage) = setup();
    let f = fixture(&storage);
    let payees = PayeeService::new(&storage);

    let hidden = payees.hide(&f.payee).unwrap();
    let deleted = payees.soft_delete(&hidden).unwrap();
    assert!(deleted.lifecycle.is_deleted());

    let mut edit = deleted.clone();
    edit.description = "Back again".into();
    assert!(payees.save(edit).unwrap_err().is_invalid_state());
    assert!(payees.hide(&deleted).unwrap_err().is_invalid_state());
    assert!(payees.unhide(&deleted).unwrap_err().is_invalid_state());
    assert!(payees.soft_delete(&deleted).unwrap_err().is_invalid_state());

    // The tombstone stays in storage
    let stored = storage.payees.get(f.payee.id).unwrap().unwrap();
    assert!(stored.lifecycle.is_deleted());
    assert_eq!(stored.description, "Grocer");
}

#[test]
fn clearing_references_unblocks_delete() {
    let (_dir, storage) = setup();
    let f = fixture(&storage);
    let txn = spend(&storage, &f, -1_000);

    TransactionService::new(&storage).soft_delete(&txn).unwrap();

    let envelopes = EnvelopeService::new(&storage);
    let envelope = envelopes.hide_envelope(&f.envelope).unwrap();
    envelopes.delete_envelope(&envelope).unwrap();
    let group = envelopes.hide_group(&f.group).unwrap();
    let group = envelopes.delete_group(&group).unwrap();
    assert!(group.lifecycle.is_deleted());
}

// =============================================================================
// Well-known rows
// =============================================================================

#[test]
fn well_known_rows_are_fixed() {
    let (_dir, storage) = setup();

    let payees = PayeeService::new(&storage);
    let starting = payees.get(STARTING_BALANCE_PAYEE).unwrap().unwrap();
    assert!(payees.hide(&starting).unwrap_err().is_conflict());
    let mut renamed = starting.clone();
    renamed.description = "Opening".into();
    assert!(payees.save(renamed).unwrap_err().is_conflict());

    let envelopes = EnvelopeService::new(&storage);
    let income = envelopes.get_envelope(INCOME_ENVELOPE).unwrap().unwrap();
    assert!(envelopes.hide_envelope(&income).unwrap_err().is_conflict());
    assert!(envelopes.delete_envelope(&income).unwrap_err().is_conflict());

    let system = envelopes.get_group(SYSTEM_GROUP).unwrap().unwrap();
    assert!(envelopes.hide_group(&system).unwrap_err().is_conflict());
}

// =============================================================================
// Transactions
// =============================================================================

#[test]
fn transactions_delete_without_hiding() {
    let (_dir, storage) = setup();
    let f = fixture(&storage);
    let txn = spend(&storage, &f, -2_500);

    let deleted = TransactionService::new(&storage).soft_delete(&txn).unwrap();
    assert!(deleted.lifecycle.is_deleted());
    assert!(storage
        .active_transactions_for_account(f.account.id)
        .unwrap()
        .is_empty());
}

#[test]
fn deleting_one_of_two_split_members_dissolves_the_split() {
    let (_dir, storage) = setup();
    let f = fixture(&storage);
    let transactions = TransactionService::new(&storage);
    let split = SplitId::new();

    let make = |cents| {
        Transaction::new(
            f.account.id,
            f.payee.id,
            Some(f.envelope.id),
            day(),
            Money::from_cents(cents),
        )
        .with_split(split)
    };
    let first = transactions.save(make(-3_000)).unwrap();
    let second = transactions.save(make(-1_500)).unwrap();

    transactions.soft_delete(&first).unwrap();

    let survivor = transactions.get(second.id).unwrap().unwrap();
    assert_eq!(survivor.split_id, None);
    assert!(survivor.lifecycle.modified_at > second.lifecycle.modified_at);
    assert!(storage.split_members(split).unwrap().is_empty());
}

#[test]
fn larger_splits_keep_their_group() {
    let (_dir, storage) = setup();
    let f = fixture(&storage);
    let transactions = TransactionService::new(&storage);
    let split = SplitId::new();

    let mut members = Vec::new();
    for cents in [-1_000, -2_000, -3_000] {
        let txn = Transaction::new(
            f.account.id,
            f.payee.id,
            Some(f.envelope.id),
            day(),
            Money::from_cents(cents),
        )
        .with_split(split);
        members.push(transactions.save(txn).unwrap());
    }

    transactions.soft_delete(&members[0]).unwrap();
    assert_eq!(storage.split_members(split).unwrap().len(), 2);
}

#[test]
fn moving_a_member_out_of_a_split_dissolves_the_rest() {
    let (_dir, storage) = setup();
    let f = fixture(&storage);
    let transactions = TransactionService::new(&storage);
    let split = SplitId::new();

    let make = |cents| {
        Transaction::new(
            f.account.id,
            f.payee.id,
            Some(f.envelope.id),
            day(),
            Money::from_cents(cents),
        )
        .with_split(split)
    };
    let first = transactions.save(make(-3_000)).unwrap();
    let second = transactions.save(make(-1_500)).unwrap();
    let third = transactions.save(make(-500)).unwrap();
    transactions.soft_delete(&third).unwrap();

    let mut moved = transactions.get(first.id).unwrap().unwrap();
    moved.split_id = None;
    transactions.save(moved).unwrap();

    let survivor = transactions.get(second.id).unwrap().unwrap();
    assert_eq!(survivor.split_id, None);
    assert!(storage.split_members(split).unwrap().is_empty());

    // The committed ledger is already what a sync would settle on
    let ledger = storage.ledger().unwrap();
    let merge = merge_ledgers(ledger.clone(), ledger.clone()).unwrap();
    assert!(merge.repaired_splits.is_empty());
    assert_eq!(merge.ledger, ledger);

    // Nothing may rejoin a split that is gone
    let mut rejoin = transactions.get(first.id).unwrap().unwrap();
    rejoin.split_id = Some(split);
    assert!(transactions.save(rejoin).unwrap_err().is_conflict());
}
