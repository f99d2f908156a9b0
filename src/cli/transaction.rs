//! Transaction CLI commands
//!
//! Implements CLI commands for recording, listing and deleting transactions.

use chrono::Local;
use clap::Subcommand;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{Money, Transaction};
use crate::services::{AccountService, EnvelopeService, PayeeService, TransactionService};
use crate::storage::Storage;

use super::{parse_date, truncate};

/// Transaction subcommands
#[derive(Subcommand)]
pub enum TransactionCommands {
    /// Record a transaction
    Add {
        /// Account name or ID
        account: String,
        /// Amount (negative for outflow), e.g. "-42.50"
        #[arg(allow_hyphen_values = true)]
        amount: String,
        /// Payee name (created if unknown)
        #[arg(short, long, conflicts_with = "to")]
        payee: Option<String>,
        /// Envelope name or ID, required with --payee
        #[arg(short, long)]
        envelope: Option<String>,
        /// Transfer to this account instead of paying a payee
        #[arg(long)]
        to: Option<String>,
        /// Transaction date (YYYY-MM-DD, default today)
        #[arg(short, long)]
        date: Option<String>,
        /// Notes
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// List transactions
    List {
        /// Filter by account
        #[arg(short, long)]
        account: Option<String>,
        /// Include hidden transactions
        #[arg(long)]
        all: bool,
        /// Number of transactions to show (most recent)
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Delete a transaction
    Delete {
        /// Transaction ID
        transaction: String,
    },
}

/// Handle a transaction command
pub fn handle_transaction_command(storage: &Storage, cmd: TransactionCommands) -> LedgerResult<()> {
    let service = TransactionService::new(storage);
    let accounts = AccountService::new(storage);

    match cmd {
        TransactionCommands::Add {
            account,
            amount,
            payee,
            envelope,
            to,
            date,
            notes,
        } => {
            let account = accounts
                .find(&account)?
                .ok_or_else(|| LedgerError::account_not_found(&account))?;
            let amount = Money::parse(&amount).map_err(|e| {
                LedgerError::Invalid(format!("Invalid amount '{}': {}", amount, e))
            })?;
            let date = match date {
                Some(date) => parse_date(&date)?,
                None => Local::now().date_naive(),
            };

            let mut txn = match (to, payee) {
                (Some(to), _) => {
                    let destination = accounts
                        .find(&to)?
                        .ok_or_else(|| LedgerError::account_not_found(&to))?;
                    Transaction::transfer(account.id, destination.id, date, amount)
                }
                (None, Some(payee)) => {
                    let payee = PayeeService::new(storage).get_or_create(&payee)?;
                    let envelope_id = match envelope {
                        Some(envelope) => Some(
                            EnvelopeService::new(storage)
                                .find_envelope(&envelope)?
                                .ok_or_else(|| LedgerError::envelope_not_found(&envelope))?
                                .id,
                        ),
                        None => None,
                    };
                    Transaction::new(account.id, payee.id, envelope_id, date, amount)
                }
                (None, None) => {
                    return Err(LedgerError::Invalid(
                        "Either --payee or --to is required".into(),
                    ))
                }
            };
            if let Some(notes) = notes {
                txn.notes = notes;
            }

            let txn = service.save(txn)?;
            println!("Recorded transaction: {}", txn);
        }

        TransactionCommands::List {
            account,
            all,
            limit,
        } => {
            let account_id = match account {
                Some(account) => Some(
                    accounts
                        .find(&account)?
                        .ok_or_else(|| LedgerError::account_not_found(&account))?
                        .id,
                ),
                None => None,
            };

            let txns = service.list(account_id, all)?;
            if txns.is_empty() {
                println!("No transactions found.");
                return Ok(());
            }

            println!(
                "{:12} {:10} {:20} {:25} {:>12}",
                "ID", "Date", "Account", "Payee", "Amount"
            );
            println!("{}", "-".repeat(83));
            let skip = txns.len().saturating_sub(limit);
            for txn in txns.iter().skip(skip) {
                let account_name = accounts
                    .get(txn.account_id)?
                    .map(|a| a.name)
                    .unwrap_or_else(|| "(missing)".to_string());
                println!(
                    "{:12} {:10} {:20} {:25} {:>12}",
                    txn.id.to_string(),
                    txn.service_date.format("%Y-%m-%d").to_string(),
                    truncate(&account_name, 20),
                    truncate(&counterparty_name(storage, txn)?, 25),
                    txn.amount.to_string()
                );
            }
            println!("\nShowing {} of {} transactions", txns.len() - skip, txns.len());
        }

        TransactionCommands::Delete { transaction } => {
            let found = service
                .find(&transaction)?
                .ok_or_else(|| LedgerError::transaction_not_found(&transaction))?;
            let deleted = service.soft_delete(&found)?;
            println!("Deleted transaction: {}", deleted);
        }
    }

    Ok(())
}

fn counterparty_name(storage: &Storage, txn: &Transaction) -> LedgerResult<String> {
    if let Some(account) = storage.accounts.get(txn.payee_as_account())? {
        return Ok(format!("Transfer: {}", account.name));
    }
    Ok(storage
        .payees
        .get(txn.payee_id)?
        .map(|p| p.description)
        .unwrap_or_else(|| "(missing)".to_string()))
}
