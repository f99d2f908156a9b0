//! Payee CLI commands
//!
//! Implements CLI commands for payee management.

use clap::Subcommand;

use crate::error::{LedgerError, LedgerResult};
use crate::models::Payee;
use crate::services::PayeeService;
use crate::storage::Storage;

use super::truncate;

/// Payee subcommands
#[derive(Subcommand)]
pub enum PayeeCommands {
    /// Add a payee
    Add {
        /// Payee name
        name: String,
    },
    /// List payees
    List {
        /// Include hidden payees
        #[arg(short, long)]
        all: bool,
        /// Only show payees whose name contains this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Rename a payee or change its notes
    Edit {
        /// Payee name or ID
        payee: String,
        /// New name
        #[arg(short, long)]
        name: Option<String>,
        /// New notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Hide a payee from normal listings
    Hide {
        /// Payee name or ID
        payee: String,
    },
    /// Show a hidden payee again
    Unhide {
        /// Payee name or ID
        payee: String,
    },
    /// Delete a hidden payee no transaction uses
    Delete {
        /// Payee name or ID
        payee: String,
    },
}

/// Handle a payee command
pub fn handle_payee_command(storage: &Storage, cmd: PayeeCommands) -> LedgerResult<()> {
    let service = PayeeService::new(storage);

    match cmd {
        PayeeCommands::Add { name } => {
            let payee = service.save(Payee::new(name.trim()))?;
            println!("Created payee: {}", payee.description);
            println!("  ID: {}", payee.id);
        }

        PayeeCommands::List { all, search } => {
            let needle = search.map(|s| Payee::normalize_name(&s));
            let payees: Vec<Payee> = service
                .list(all)?
                .into_iter()
                .filter(|p| {
                    needle
                        .as_deref()
                        .map_or(true, |n| Payee::normalize_name(&p.description).contains(n))
                })
                .collect();

            if payees.is_empty() {
                println!("No payees found.");
                return Ok(());
            }

            println!("{:12} {:40} {:8}", "ID", "Name", "Status");
            println!("{}", "-".repeat(62));
            for payee in &payees {
                println!(
                    "{:12} {:40} {:8}",
                    payee.id.to_string(),
                    truncate(&payee.description, 40),
                    if payee.lifecycle.is_hidden() { "hidden" } else { "" }
                );
            }
            println!("\nTotal: {} payees", payees.len());
        }

        PayeeCommands::Edit { payee, name, notes } => {
            let mut found = find(&service, &payee)?;
            if name.is_none() && notes.is_none() {
                println!("No changes specified. Use --name or --notes.");
                return Ok(());
            }
            let old_name = found.description.clone();
            if let Some(name) = name {
                found.description = name.trim().to_string();
            }
            if let Some(notes) = notes {
                found.notes = notes;
            }

            let updated = service.save(found)?;
            if updated.description != old_name {
                println!("Renamed payee '{}' to '{}'", old_name, updated.description);
            } else {
                println!("Updated payee: {}", updated.description);
            }
        }

        PayeeCommands::Hide { payee } => {
            let hidden = service.hide(&find(&service, &payee)?)?;
            println!("Hid payee: {}", hidden.description);
        }

        PayeeCommands::Unhide { payee } => {
            let shown = service.unhide(&find(&service, &payee)?)?;
            println!("Unhid payee: {}", shown.description);
        }

        PayeeCommands::Delete { payee } => {
            let deleted = service.soft_delete(&find(&service, &payee)?)?;
            println!("Deleted payee: {}", deleted.description);
        }
    }

    Ok(())
}

fn find(service: &PayeeService<'_>, identifier: &str) -> LedgerResult<Payee> {
    service
        .find(identifier)?
        .ok_or_else(|| LedgerError::payee_not_found(identifier))
}
