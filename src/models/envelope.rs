//! Envelope and EnvelopeGroup models
//!
//! Envelopes are the budget categories money is assigned to; every envelope
//! belongs to exactly one group.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::entity::{impl_entity, EntityKind, Lifecycle};
use super::ids::{EnvelopeGroupId, EnvelopeId};

/// A group of related envelopes (e.g., "Bills", "Needs", "Wants")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeGroup {
    pub id: EnvelopeGroupId,

    pub description: String,

    #[serde(default)]
    pub notes: String,

    #[serde(flatten)]
    pub lifecycle: Lifecycle,
}

impl_entity!(EnvelopeGroup, EnvelopeGroupId, EntityKind::EnvelopeGroup, |g| {
    g.description.clone()
});

impl EnvelopeGroup {
    /// Create a draft group
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: EnvelopeGroupId::new(),
            description: description.into(),
            notes: String::new(),
            lifecycle: Lifecycle::draft(),
        }
    }

    pub fn validate(&self) -> Result<(), EnvelopeValidationError> {
        validate_description(&self.description)
    }
}

impl fmt::Display for EnvelopeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description)
    }
}

/// A budget envelope within a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: EnvelopeId,

    pub description: String,

    /// The group this envelope belongs to
    pub group_id: EnvelopeGroupId,

    #[serde(default)]
    pub notes: String,

    /// Monthly goal in cents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_amount: Option<i64>,

    #[serde(flatten)]
    pub lifecycle: Lifecycle,
}

impl_entity!(Envelope, EnvelopeId, EntityKind::Envelope, |e| e.description.clone());

impl Envelope {
    /// Create a draft envelope
    pub fn new(description: impl Into<String>, group_id: EnvelopeGroupId) -> Self {
        Self {
            id: EnvelopeId::new(),
            description: description.into(),
            group_id,
            notes: String::new(),
            goal_amount: None,
            lifecycle: Lifecycle::draft(),
        }
    }

    pub fn validate(&self) -> Result<(), EnvelopeValidationError> {
        validate_description(&self.description)?;

        if let Some(goal) = self.goal_amount {
            if goal < 0 {
                return Err(EnvelopeValidationError::NegativeGoal);
            }
        }

        Ok(())
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description)
    }
}

fn validate_description(description: &str) -> Result<(), EnvelopeValidationError> {
    if description.trim().is_empty() {
        return Err(EnvelopeValidationError::EmptyDescription);
    }

    if description.len() > 50 {
        return Err(EnvelopeValidationError::DescriptionTooLong(description.len()));
    }

    Ok(())
}

/// Validation errors for envelopes and groups
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeValidationError {
    EmptyDescription,
    DescriptionTooLong(usize),
    NegativeGoal,
}

impl fmt::Display for EnvelopeValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyDescription => write!(f, "Description cannot be empty"),
            Self::DescriptionTooLong(len) => {
                write!(f, "Description too long ({} chars, max 50)", len)
            }
            Self::NegativeGoal => write!(f, "Goal amount cannot be negative"),
        }
    }
}

impl std::error::Error for EnvelopeValidationError {}
