//! Audit entry data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Entity, EntityKind};

use super::diff::generate_diff;

/// Types of operations that can be audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Hide,
    Unhide,
    Delete,
    /// A sync cycle replaced local rows with merged ones
    Merge,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Hide => "HIDE",
            Operation::Unhide => "UNHIDE",
            Operation::Delete => "DELETE",
            Operation::Merge => "MERGE",
        };
        f.write_str(label)
    }
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the operation occurred (UTC)
    pub timestamp: DateTime<Utc>,

    pub operation: Operation,

    /// Absent on merge entries, which span every kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_kind: Option<EntityKind>,

    pub entity_id: String,

    /// Human-readable description of the entity (e.g., account name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,

    /// JSON of the entity before the operation (absent for creates)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<serde_json::Value>,

    /// JSON of the entity after the operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_summary: Option<String>,
}

impl AuditEntry {
    /// Entry for a lifecycle operation on one entity
    ///
    /// `before` is `None` for creates. Updates, hides and unhides carry a diff.
    pub fn lifecycle<T: Entity>(operation: Operation, before: Option<&T>, after: &T) -> Self {
        let before = before.and_then(|b| serde_json::to_value(b).ok());
        let after_value = serde_json::to_value(after).ok();

        let diff_summary = match (operation, &before, &after_value) {
            (Operation::Create | Operation::Delete, _, _) => None,
            (_, Some(b), Some(a)) => generate_diff(b, a),
            _ => None,
        };

        Self {
            timestamp: Utc::now(),
            operation,
            entity_kind: Some(T::KIND),
            entity_id: after.id().to_string(),
            entity_name: Some(after.display_name()),
            before,
            after: after_value,
            diff_summary,
        }
    }

    /// Entry for a sync cycle that changed the local ledger
    pub fn merge(remote: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            operation: Operation::Merge,
            entity_kind: None,
            entity_id: remote.into(),
            entity_name: None,
            before: None,
            after: None,
            diff_summary: Some(summary.into()),
        }
    }

    /// Format the entry for human-readable output
    pub fn format_human_readable(&self) -> String {
        let mut output = format!(
            "[{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.operation
        );

        if let Some(kind) = self.entity_kind {
            output.push_str(&format!(" {}", kind));
        }
        output.push_str(&format!(" {}", self.entity_id));

        if let Some(name) = &self.entity_name {
            output.push_str(&format!(" ({})", name));
        }

        if let Some(diff) = &self.diff_summary {
            output.push_str(&format!("\n  Changes: {}", diff));
        }

        output
    }
}
