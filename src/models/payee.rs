//! Payee model
//!
//! Payees are who a transaction was paid to or received from. Transfers do
//! not use a payee row: their payee id is the other account's id.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::entity::{impl_entity, EntityKind, Lifecycle};
use super::ids::PayeeId;

/// A payee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payee {
    /// Unique identifier
    pub id: PayeeId,

    /// Payee name as shown in registers
    pub description: String,

    #[serde(default)]
    pub notes: String,

    #[serde(flatten)]
    pub lifecycle: Lifecycle,
}

impl_entity!(Payee, PayeeId, EntityKind::Payee, |p| p.description.clone());

impl Payee {
    /// Create a draft payee
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: PayeeId::new(),
            description: description.into(),
            notes: String::new(),
            lifecycle: Lifecycle::draft(),
        }
    }

    /// Validate the payee
    pub fn validate(&self) -> Result<(), PayeeValidationError> {
        if self.description.trim().is_empty() {
            return Err(PayeeValidationError::EmptyDescription);
        }

        if self.description.len() > 100 {
            return Err(PayeeValidationError::DescriptionTooLong(
                self.description.len(),
            ));
        }

        Ok(())
    }

    /// Normalize a payee name for matching
    pub fn normalize_name(name: &str) -> String {
        name.trim().to_lowercase()
    }

    /// Check if this payee matches a name (case-insensitive)
    pub fn matches_name(&self, name: &str) -> bool {
        Self::normalize_name(&self.description) == Self::normalize_name(name)
    }
}

impl fmt::Display for Payee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description)
    }
}

/// Validation errors for payees
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayeeValidationError {
    EmptyDescription,
    DescriptionTooLong(usize),
}

impl fmt::Display for PayeeValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyDescription => write!(f, "Payee description cannot be empty"),
            Self::DescriptionTooLong(len) => {
                write!(f, "Payee description too long ({} chars, max 100)", len)
            }
        }
    }
}

impl std::error::Error for PayeeValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        let mut payee = Payee::new("Grocery");
        assert!(payee.validate().is_ok());

        payee.description = String::new();
        assert_eq!(
            payee.validate(),
            Err(PayeeValidationError::EmptyDescription)
        );
    }

    #[test]
    fn test_name_matching() {
        let payee = Payee::new("Test Store");
        assert!(payee.matches_name("TEST STORE"));
        assert!(payee.matches_name("  test store "));
        assert!(!payee.matches_name("Other Store"));
    }
}
