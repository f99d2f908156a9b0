//! Configuration module for the envelope ledger
//!
//! This module provides configuration management including:
//! - Platform-aware path resolution
//! - User settings persistence, sync configuration included

pub mod paths;
pub mod settings;

pub use paths::LedgerPaths;
pub use settings::{Settings, SyncMode, SyncSettings};
