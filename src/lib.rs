//! Envelope Ledger - offline-first envelope budgeting with replica sync
//!
//! Every device keeps a complete local ledger of accounts, payees, envelope
//! groups, envelopes and transactions. Edits never delete rows outright:
//! entities move through draft, active, hidden and deleted states, and the
//! tombstones left behind let independently edited replicas be merged back
//! together through a shared snapshot file.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `models`: Core data models and their lifecycle fields
//! - `storage`: JSON file storage layer
//! - `services`: Lifecycle rules for each entity kind
//! - `audit`: Audit logging system
//! - `events`: Change notifications
//! - `sync`: Snapshots, merge, transports and the sync orchestrator
//! - `cli`: Command handlers for the `envelope` binary
//!
//! # Example
//!
//! ```rust,ignore
//! use envelope_ledger::config::LedgerPaths;
//! use envelope_ledger::models::{Account, AccountType};
//! use envelope_ledger::services::AccountService;
//! use envelope_ledger::storage::{initialize_storage, Storage};
//!
//! let storage = Storage::open(LedgerPaths::new()?)?;
//! initialize_storage(&storage)?;
//! let checking = AccountService::new(&storage).save(Account::new("Checking", AccountType::Checking))?;
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod services;
pub mod storage;
pub mod sync;

pub use error::{LedgerError, LedgerResult};
