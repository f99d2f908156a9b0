//! User settings for the envelope ledger
//!
//! Manages display preferences and the sync configuration, including the
//! last-successful-sync timestamp the orchestrator writes back after a cycle.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::paths::LedgerPaths;
use crate::error::LedgerError;
use crate::storage::file_io::write_json_atomic;

/// Where synchronized snapshots live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum SyncMode {
    /// No sync; cycles complete immediately without touching any file
    #[default]
    Disabled,
    /// A directory on this machine, typically a cloud provider's synced folder
    Local { root: PathBuf },
}

impl SyncMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// Sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default)]
    pub mode: SyncMode,

    /// Directory under the sync root holding this ledger's snapshot
    #[serde(default = "default_remote_dir")]
    pub remote_dir: String,

    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: String,

    /// Quiet period after the last mutation before a cycle starts
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: u64,

    /// Treat an unreadable remote snapshot as absent instead of failing the cycle
    #[serde(default)]
    pub tolerate_corrupt_remote: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,

    /// Identifies this replica's uploads on the shared remote
    #[serde(default = "Uuid::new_v4")]
    pub replica_id: Uuid,
}

fn default_remote_dir() -> String {
    "EnvelopeLedger".to_string()
}

fn default_snapshot_file() -> String {
    "ledger.json".to_string()
}

fn default_debounce_secs() -> u64 {
    5
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            mode: SyncMode::default(),
            remote_dir: default_remote_dir(),
            snapshot_file: default_snapshot_file(),
            debounce_secs: default_debounce_secs(),
            tolerate_corrupt_remote: false,
            last_synced_at: None,
            replica_id: Uuid::new_v4(),
        }
    }
}

impl SyncSettings {
    /// Remote path of the snapshot, relative to the sync root
    pub fn snapshot_path(&self) -> String {
        format!("{}/{}", self.remote_dir, self.snapshot_file)
    }

    /// Where this replica stages an upload before moving it into place
    pub fn upload_path(&self) -> String {
        format!("{}.{}.tmp", self.snapshot_path(), self.replica_id.simple())
    }
}

/// User settings for the envelope ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Date format preference (strftime format)
    #[serde(default = "default_date_format")]
    pub date_format: String,

    #[serde(default)]
    pub sync: SyncSettings,
}

fn default_schema_version() -> u32 {
    1
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            date_format: default_date_format(),
            sync: SyncSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or return defaults if the file doesn't exist
    pub fn load_or_create(paths: &LedgerPaths) -> Result<Self, LedgerError> {
        let settings_path = paths.settings_file();

        if !settings_path.exists() {
            // Don't save yet - let caller decide when to persist
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(&settings_path)
            .map_err(|e| LedgerError::Io(format!("Failed to read settings file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| LedgerError::Config(format!("Failed to parse settings file: {}", e)))
    }

    /// Save settings to disk
    pub fn save(&self, paths: &LedgerPaths) -> Result<(), LedgerError> {
        paths.ensure_directories()?;
        write_json_atomic(paths.settings_file(), self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.sync.mode, SyncMode::Disabled);
        assert_eq!(settings.sync.debounce_secs, 5);
        assert_eq!(settings.sync.snapshot_path(), "EnvelopeLedger/ledger.json");
        assert!(!settings.sync.tolerate_corrupt_remote);
        assert_ne!(settings.sync.replica_id, Settings::default().sync.replica_id);
        assert!(settings.sync.upload_path().starts_with("EnvelopeLedger/ledger.json."));
        assert!(settings.sync.upload_path().ends_with(".tmp"));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = LedgerPaths::with_base_dir(temp_dir.path().to_path_buf());

        let mut settings = Settings::default();
        settings.sync.mode = SyncMode::Local {
            root: temp_dir.path().join("remote"),
        };
        settings.sync.last_synced_at = Some(Utc::now());
        settings.save(&paths).unwrap();

        let loaded = Settings::load_or_create(&paths).unwrap();
        assert!(loaded.sync.mode.is_enabled());
        assert_eq!(loaded.sync.last_synced_at, settings.sync.last_synced_at);
        assert_eq!(loaded.sync.replica_id, settings.sync.replica_id);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"sync": {"mode": {"provider": "disabled"}}}"#).unwrap();
        assert_eq!(settings.schema_version, 1);
        assert_eq!(settings.sync.remote_dir, "EnvelopeLedger");
    }

    #[test]
    fn test_unparsable_settings_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let paths = LedgerPaths::with_base_dir(temp_dir.path().to_path_buf());
        std::fs::write(paths.settings_file(), "not json").unwrap();

        let err = Settings::load_or_create(&paths).unwrap_err();
        assert!(matches!(err, LedgerError::Config(_)));
    }
}
