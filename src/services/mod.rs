//! Service layer for the envelope ledger
//!
//! Services are the lifecycle rules: every save, hide, unhide and soft
//! delete goes through them, gets validated against the store's read path,
//! and comes back as the updated entity or a typed error.

pub mod account;
pub mod envelope;
pub(crate) mod lifecycle;
pub mod payee;
pub mod transaction;

pub use account::AccountService;
pub use envelope::EnvelopeService;
pub use payee::PayeeService;
pub use transaction::TransactionService;
