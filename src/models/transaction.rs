//! Transaction model
//!
//! A transaction references its account, payee and (optionally) envelope by id
//! only. Several rows sharing a `split_id` together form one user-visible
//! split transaction.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::entity::{impl_entity, EntityKind, Lifecycle};
use super::ids::{AccountId, EnvelopeId, PayeeId, SplitId, TransactionId};
use super::money::Money;

/// A financial transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,

    pub account_id: AccountId,

    /// Payee row, or the other account's id for transfers
    pub payee_id: PayeeId,

    /// Omitted for transfers and starting balances
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envelope_id: Option<EnvelopeId>,

    /// Shared by all rows of one split transaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_id: Option<SplitId>,

    /// Positive for inflow, negative for outflow
    pub amount: Money,

    pub service_date: NaiveDate,

    #[serde(default)]
    pub notes: String,

    #[serde(flatten)]
    pub lifecycle: Lifecycle,
}

impl_entity!(Transaction, TransactionId, EntityKind::Transaction, |t| format!(
    "{} {}",
    t.service_date.format("%Y-%m-%d"),
    t.amount
));

impl Transaction {
    /// Create a draft transaction
    pub fn new(
        account_id: AccountId,
        payee_id: PayeeId,
        envelope_id: Option<EnvelopeId>,
        service_date: NaiveDate,
        amount: Money,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            account_id,
            payee_id,
            envelope_id,
            split_id: None,
            amount,
            service_date,
            notes: String::new(),
            lifecycle: Lifecycle::draft(),
        }
    }

    /// Create a draft transfer from `account_id` to `destination`
    pub fn transfer(
        account_id: AccountId,
        destination: AccountId,
        service_date: NaiveDate,
        amount: Money,
    ) -> Self {
        Self::new(account_id, destination.into(), None, service_date, amount)
    }

    /// Put this row into a split group
    pub fn with_split(mut self, split_id: SplitId) -> Self {
        self.split_id = Some(split_id);
        self
    }

    pub fn is_split(&self) -> bool {
        self.split_id.is_some()
    }

    /// Payee id read as an account id, meaningful when this is a transfer
    pub fn payee_as_account(&self) -> AccountId {
        AccountId::from_uuid(*self.payee_id.as_uuid())
    }

    pub fn validate(&self) -> Result<(), TransactionValidationError> {
        if self.notes.len() > 500 {
            return Err(TransactionValidationError::NotesTooLong(self.notes.len()));
        }

        if self.payee_id.as_uuid() == self.account_id.as_uuid() {
            return Err(TransactionValidationError::TransferToSelf);
        }

        Ok(())
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.service_date.format("%Y-%m-%d"),
            self.id,
            self.amount
        )
    }
}

/// Validation errors for transactions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionValidationError {
    NotesTooLong(usize),
    TransferToSelf,
}

impl fmt::Display for TransactionValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotesTooLong(len) => {
                write!(f, "Transaction notes too long ({} chars, max 500)", len)
            }
            Self::TransferToSelf => write!(f, "An account cannot transfer to itself"),
        }
    }
}

impl std::error::Error for TransactionValidationError {}
