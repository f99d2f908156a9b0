//! Envelope and envelope group CLI commands

use clap::Subcommand;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{Envelope, EnvelopeGroup, Money};
use crate::services::EnvelopeService;
use crate::storage::Storage;

use super::truncate;

/// Envelope group subcommands
#[derive(Subcommand)]
pub enum GroupCommands {
    /// Add an envelope group
    Add {
        /// Group name
        name: String,
    },
    /// List envelope groups
    List {
        /// Include hidden groups
        #[arg(short, long)]
        all: bool,
    },
    /// Rename a group or change its notes
    Edit {
        /// Group name or ID
        group: String,
        /// New name
        #[arg(short, long)]
        name: Option<String>,
        /// New notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Hide a group from normal listings
    Hide {
        /// Group name or ID
        group: String,
    },
    /// Show a hidden group again
    Unhide {
        /// Group name or ID
        group: String,
    },
    /// Delete a hidden group whose envelopes are all deleted
    Delete {
        /// Group name or ID
        group: String,
    },
}

/// Envelope subcommands
#[derive(Subcommand)]
pub enum EnvelopeCommands {
    /// Add an envelope to a group
    Add {
        /// Envelope name
        name: String,
        /// Group name or ID
        #[arg(short, long)]
        group: String,
        /// Savings goal (e.g., "500.00")
        #[arg(long)]
        goal: Option<String>,
    },
    /// List envelopes
    List {
        /// Only envelopes in this group
        #[arg(short, long)]
        group: Option<String>,
        /// Include hidden envelopes
        #[arg(short, long)]
        all: bool,
    },
    /// Edit an envelope
    Edit {
        /// Envelope name or ID
        envelope: String,
        /// New name
        #[arg(short, long)]
        name: Option<String>,
        /// Move to another group
        #[arg(short, long)]
        group: Option<String>,
        /// New notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Hide an envelope from normal listings
    Hide {
        /// Envelope name or ID
        envelope: String,
    },
    /// Show a hidden envelope again
    Unhide {
        /// Envelope name or ID
        envelope: String,
    },
    /// Delete a hidden envelope no transaction uses
    Delete {
        /// Envelope name or ID
        envelope: String,
    },
}

/// Handle an envelope group command
pub fn handle_group_command(storage: &Storage, cmd: GroupCommands) -> LedgerResult<()> {
    let service = EnvelopeService::new(storage);

    match cmd {
        GroupCommands::Add { name } => {
            let group = service.save_group(EnvelopeGroup::new(name.trim()))?;
            println!("Created group: {}", group.description);
            println!("  ID: {}", group.id);
        }

        GroupCommands::List { all } => {
            let groups = service.list_groups(all)?;
            if groups.is_empty() {
                println!("No envelope groups found.");
                return Ok(());
            }

            println!("{:12} {:30} {:>9} {:8}", "ID", "Name", "Envelopes", "Status");
            println!("{}", "-".repeat(62));
            for group in &groups {
                let envelopes = service.list_envelopes(Some(group.id), all)?;
                println!(
                    "{:12} {:30} {:>9} {:8}",
                    group.id.to_string(),
                    truncate(&group.description, 30),
                    envelopes.len(),
                    if group.lifecycle.is_hidden() { "hidden" } else { "" }
                );
            }
        }

        GroupCommands::Edit { group, name, notes } => {
            let mut found = find_group(&service, &group)?;
            if name.is_none() && notes.is_none() {
                println!("No changes specified. Use --name or --notes.");
                return Ok(());
            }
            if let Some(name) = name {
                found.description = name.trim().to_string();
            }
            if let Some(notes) = notes {
                found.notes = notes;
            }

            let updated = service.save_group(found)?;
            println!("Updated group: {}", updated.description);
        }

        GroupCommands::Hide { group } => {
            let hidden = service.hide_group(&find_group(&service, &group)?)?;
            println!("Hid group: {}", hidden.description);
        }

        GroupCommands::Unhide { group } => {
            let shown = service.unhide_group(&find_group(&service, &group)?)?;
            println!("Unhid group: {}", shown.description);
        }

        GroupCommands::Delete { group } => {
            let deleted = service.delete_group(&find_group(&service, &group)?)?;
            println!("Deleted group: {}", deleted.description);
        }
    }

    Ok(())
}

/// Handle an envelope command
pub fn handle_envelope_command(storage: &Storage, cmd: EnvelopeCommands) -> LedgerResult<()> {
    let service = EnvelopeService::new(storage);

    match cmd {
        EnvelopeCommands::Add { name, group, goal } => {
            let group = find_group(&service, &group)?;
            let mut envelope = Envelope::new(name.trim(), group.id);
            envelope.goal_amount = goal.as_deref().map(parse_goal).transpose()?;

            let envelope = service.save_envelope(envelope)?;
            println!("Created envelope: {}", envelope.description);
            println!("  Group: {}", group.description);
            println!("  ID: {}", envelope.id);
        }

        EnvelopeCommands::List { group, all } => {
            let group_id = match group {
                Some(group) => Some(find_group(&service, &group)?.id),
                None => None,
            };
            let envelopes = service.list_envelopes(group_id, all)?;
            if envelopes.is_empty() {
                println!("No envelopes found.");
                return Ok(());
            }

            println!("{:12} {:30} {:20} {:>12} {:8}", "ID", "Name", "Group", "Goal", "Status");
            println!("{}", "-".repeat(86));
            for envelope in &envelopes {
                let group_name = service
                    .get_group(envelope.group_id)?
                    .map(|g| g.description)
                    .unwrap_or_else(|| "(missing)".to_string());
                let goal = envelope
                    .goal_amount
                    .map(|cents| Money::from_cents(cents).to_string())
                    .unwrap_or_default();
                println!(
                    "{:12} {:30} {:20} {:>12} {:8}",
                    envelope.id.to_string(),
                    truncate(&envelope.description, 30),
                    truncate(&group_name, 20),
                    goal,
                    if envelope.lifecycle.is_hidden() { "hidden" } else { "" }
                );
            }
        }

        EnvelopeCommands::Edit {
            envelope,
            name,
            group,
            notes,
        } => {
            let mut found = find_envelope(&service, &envelope)?;
            if name.is_none() && group.is_none() && notes.is_none() {
                println!("No changes specified. Use --name, --group or --notes.");
                return Ok(());
            }
            if let Some(name) = name {
                found.description = name.trim().to_string();
            }
            if let Some(group) = group {
                found.group_id = find_group(&service, &group)?.id;
            }
            if let Some(notes) = notes {
                found.notes = notes;
            }

            let updated = service.save_envelope(found)?;
            println!("Updated envelope: {}", updated.description);
        }

        EnvelopeCommands::Hide { envelope } => {
            let hidden = service.hide_envelope(&find_envelope(&service, &envelope)?)?;
            println!("Hid envelope: {}", hidden.description);
        }

        EnvelopeCommands::Unhide { envelope } => {
            let shown = service.unhide_envelope(&find_envelope(&service, &envelope)?)?;
            println!("Unhid envelope: {}", shown.description);
        }

        EnvelopeCommands::Delete { envelope } => {
            let deleted = service.delete_envelope(&find_envelope(&service, &envelope)?)?;
            println!("Deleted envelope: {}", deleted.description);
        }
    }

    Ok(())
}

fn parse_goal(input: &str) -> LedgerResult<i64> {
    let goal = Money::parse(input)
        .map_err(|e| LedgerError::Invalid(format!("Invalid goal amount '{}': {}", input, e)))?;
    Ok(goal.cents())
}

fn find_group(service: &EnvelopeService<'_>, identifier: &str) -> LedgerResult<EnvelopeGroup> {
    service
        .find_group(identifier)?
        .ok_or_else(|| LedgerError::group_not_found(identifier))
}

fn find_envelope(service: &EnvelopeService<'_>, identifier: &str) -> LedgerResult<Envelope> {
    service
        .find_envelope(identifier)?
        .ok_or_else(|| LedgerError::envelope_not_found(identifier))
}
