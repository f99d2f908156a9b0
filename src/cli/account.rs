//! Account CLI commands
//!
//! Implements CLI commands for account management.

use chrono::Local;
use clap::Subcommand;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{Account, AccountType, Money};
use crate::services::AccountService;
use crate::storage::Storage;

use super::{parse_date, truncate};

/// Account subcommands
#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account
    Add {
        /// Account name
        name: String,
        /// Account type (checking, savings, credit, cash, investment)
        #[arg(short = 't', long, default_value = "checking")]
        account_type: String,
        /// Starting balance (e.g., "1000.00" or "1000")
        #[arg(short, long, default_value = "0")]
        balance: String,
        /// Date of the starting balance (YYYY-MM-DD, default today)
        #[arg(short, long)]
        date: Option<String>,
        /// Mark as off-budget
        #[arg(long)]
        off_budget: bool,
    },
    /// List accounts
    List {
        /// Include hidden accounts
        #[arg(short, long)]
        all: bool,
    },
    /// Edit an account
    Edit {
        /// Account name or ID
        account: String,
        /// New name
        #[arg(short, long)]
        name: Option<String>,
        /// New notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Hide an account from normal listings
    Hide {
        /// Account name or ID
        account: String,
    },
    /// Show a hidden account again
    Unhide {
        /// Account name or ID
        account: String,
    },
    /// Delete a hidden account with no transactions
    Delete {
        /// Account name or ID
        account: String,
    },
}

/// Handle an account command
pub fn handle_account_command(storage: &Storage, cmd: AccountCommands) -> LedgerResult<()> {
    let service = AccountService::new(storage);

    match cmd {
        AccountCommands::Add {
            name,
            account_type,
            balance,
            date,
            off_budget,
        } => {
            let account_type = AccountType::parse(&account_type).ok_or_else(|| {
                LedgerError::Invalid(format!(
                    "Invalid account type: '{}'. Valid types: checking, savings, credit, cash, investment, line_of_credit, other",
                    account_type
                ))
            })?;

            let mut starting_balance = Money::parse(&balance).map_err(|e| {
                LedgerError::Invalid(format!(
                    "Invalid balance format: '{}'. Use format like '1000.00' or '1000'. Error: {}",
                    balance, e
                ))
            })?;

            // Debt is entered as a positive number
            if account_type.is_liability() && starting_balance.cents() > 0 {
                starting_balance = -starting_balance;
            }

            let opened_on = match date {
                Some(date) => parse_date(&date)?,
                None => Local::now().date_naive(),
            };

            let mut account = Account::new(name, account_type);
            account.on_budget = !off_budget;
            let (account, opening) = service.open(account, starting_balance, opened_on)?;

            println!("Created account: {}", account.name);
            println!("  Type: {}", account.account_type);
            println!(
                "  Starting Balance: {}",
                opening.map(|t| t.amount).unwrap_or_default()
            );
            println!(
                "  On Budget: {}",
                if account.on_budget { "Yes" } else { "No" }
            );
            println!("  ID: {}", account.id);
        }

        AccountCommands::List { all } => {
            let accounts = service.list(all)?;
            if accounts.is_empty() {
                println!("No accounts found.");
                return Ok(());
            }

            println!("{:12} {:30} {:15} {:8}", "ID", "Name", "Type", "Status");
            println!("{}", "-".repeat(68));
            for account in &accounts {
                println!(
                    "{:12} {:30} {:15} {:8}",
                    account.id.to_string(),
                    truncate(&account.name, 30),
                    account.account_type.to_string(),
                    status_label(account.lifecycle.is_hidden(), account.on_budget)
                );
            }
            println!("\nTotal: {} accounts", accounts.len());
        }

        AccountCommands::Edit {
            account,
            name,
            notes,
        } => {
            let mut found = find(&service, &account)?;
            if name.is_none() && notes.is_none() {
                println!("No changes specified. Use --name or --notes.");
                return Ok(());
            }
            if let Some(name) = name {
                found.name = name;
            }
            if let Some(notes) = notes {
                found.notes = notes;
            }

            let updated = service.save(found)?;
            println!("Updated account: {}", updated.name);
        }

        AccountCommands::Hide { account } => {
            let hidden = service.hide(&find(&service, &account)?)?;
            println!("Hid account: {}", hidden.name);
        }

        AccountCommands::Unhide { account } => {
            let shown = service.unhide(&find(&service, &account)?)?;
            println!("Unhid account: {}", shown.name);
        }

        AccountCommands::Delete { account } => {
            let deleted = service.soft_delete(&find(&service, &account)?)?;
            println!("Deleted account: {}", deleted.name);
        }
    }

    Ok(())
}

fn find(service: &AccountService<'_>, identifier: &str) -> LedgerResult<Account> {
    service
        .find(identifier)?
        .ok_or_else(|| LedgerError::account_not_found(identifier))
}

fn status_label(hidden: bool, on_budget: bool) -> &'static str {
    match (hidden, on_budget) {
        (true, _) => "hidden",
        (false, true) => "budget",
        (false, false) => "tracking",
    }
}
