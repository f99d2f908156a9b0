//! Core data models for the envelope ledger
//!
//! This module contains the data structures that represent the budgeting
//! domain (accounts, payees, envelopes, transactions) together with the
//! lifecycle fields every one of them carries.

pub mod account;
pub mod entity;
pub mod envelope;
pub mod ids;
pub mod ledger;
pub mod money;
pub mod payee;
pub mod transaction;
pub mod well_known;

pub use account::{Account, AccountType};
pub use entity::{Entity, EntityKind, Lifecycle};
pub use envelope::{Envelope, EnvelopeGroup};
pub use ids::{AccountId, EnvelopeGroupId, EnvelopeId, PayeeId, SplitId, TransactionId};
pub use ledger::Ledger;
pub use money::Money;
pub use payee::Payee;
pub use transaction::Transaction;
