//! Audit logging
//!
//! Records every lifecycle operation (create, update, hide, unhide, delete)
//! with before/after values, plus one `merge` entry per sync cycle that
//! changed the local ledger, in an append-only JSONL file.
//!
//! # Example
//!
//! ```rust,ignore
//! use envelope_ledger::audit::{AuditEntry, AuditLogger, Operation};
//!
//! let logger = AuditLogger::new(audit_log_path);
//! logger.log(&AuditEntry::lifecycle(Operation::Update, Some(&before), &after))?;
//! ```

mod diff;
mod entry;
mod logger;

pub use diff::generate_diff;
pub use entry::{AuditEntry, Operation};
pub use logger::AuditLogger;
