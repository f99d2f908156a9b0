//! Registry of well-known entities
//!
//! These rows exist in every ledger with the same fixed ids. They are seeded
//! at initialization, never hidden, never deleted and never edited, so every
//! replica holds identical copies and merges never see them change.

use chrono::{DateTime, TimeZone, Utc};

use super::envelope::{Envelope, EnvelopeGroup};
use super::entity::Lifecycle;
use super::ids::{EnvelopeGroupId, EnvelopeId, PayeeId};
use super::payee::Payee;

pub const STARTING_BALANCE_PAYEE: PayeeId = PayeeId::from_u128(0x0b5e_0000_0000_0000_0000_0000_0000_0001);

pub const SYSTEM_GROUP: EnvelopeGroupId = EnvelopeGroupId::from_u128(0x0b5e_0000_0000_0000_0000_0000_0001_0001);
pub const INCOME_GROUP: EnvelopeGroupId = EnvelopeGroupId::from_u128(0x0b5e_0000_0000_0000_0000_0000_0001_0002);
pub const DEBT_GROUP: EnvelopeGroupId = EnvelopeGroupId::from_u128(0x0b5e_0000_0000_0000_0000_0000_0001_0003);
pub const HIDDEN_GROUP: EnvelopeGroupId = EnvelopeGroupId::from_u128(0x0b5e_0000_0000_0000_0000_0000_0001_0004);

pub const INCOME_ENVELOPE: EnvelopeId = EnvelopeId::from_u128(0x0b5e_0000_0000_0000_0000_0000_0002_0001);
pub const BUFFER_ENVELOPE: EnvelopeId = EnvelopeId::from_u128(0x0b5e_0000_0000_0000_0000_0000_0002_0002);
pub const IGNORED_ENVELOPE: EnvelopeId = EnvelopeId::from_u128(0x0b5e_0000_0000_0000_0000_0000_0002_0003);
pub const GENERIC_DEBT_ENVELOPE: EnvelopeId = EnvelopeId::from_u128(0x0b5e_0000_0000_0000_0000_0000_0002_0004);
pub const GENERIC_HIDDEN_ENVELOPE: EnvelopeId = EnvelopeId::from_u128(0x0b5e_0000_0000_0000_0000_0000_0002_0005);

const PAYEES: [PayeeId; 1] = [STARTING_BALANCE_PAYEE];

const GROUPS: [EnvelopeGroupId; 4] = [SYSTEM_GROUP, INCOME_GROUP, DEBT_GROUP, HIDDEN_GROUP];

const ENVELOPES: [EnvelopeId; 5] = [
    INCOME_ENVELOPE,
    BUFFER_ENVELOPE,
    IGNORED_ENVELOPE,
    GENERIC_DEBT_ENVELOPE,
    GENERIC_HIDDEN_ENVELOPE,
];

pub fn is_well_known_payee(id: PayeeId) -> bool {
    PAYEES.contains(&id)
}

pub fn is_well_known_group(id: EnvelopeGroupId) -> bool {
    GROUPS.contains(&id)
}

pub fn is_well_known_envelope(id: EnvelopeId) -> bool {
    ENVELOPES.contains(&id)
}

/// Envelopes living in the system group are managed by the ledger itself
pub fn is_system_envelope(envelope: &Envelope) -> bool {
    is_well_known_envelope(envelope.id) || envelope.group_id == SYSTEM_GROUP
}

/// Creation time stamped on every seeded row, identical across replicas
pub fn seed_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub fn seed_payees() -> Vec<Payee> {
    vec![Payee {
        id: STARTING_BALANCE_PAYEE,
        description: "Starting Balance".into(),
        notes: String::new(),
        lifecycle: Lifecycle::committed(seed_timestamp()),
    }]
}

pub fn seed_groups() -> Vec<EnvelopeGroup> {
    [
        (SYSTEM_GROUP, "System"),
        (INCOME_GROUP, "Income"),
        (DEBT_GROUP, "Debt"),
        (HIDDEN_GROUP, "Hidden"),
    ]
    .into_iter()
    .map(|(id, description)| EnvelopeGroup {
        id,
        description: description.into(),
        notes: String::new(),
        lifecycle: Lifecycle::committed(seed_timestamp()),
    })
    .collect()
}

pub fn seed_envelopes() -> Vec<Envelope> {
    [
        (INCOME_ENVELOPE, "Income", INCOME_GROUP),
        (BUFFER_ENVELOPE, "Buffer", INCOME_GROUP),
        (IGNORED_ENVELOPE, "Ignored", SYSTEM_GROUP),
        (GENERIC_DEBT_ENVELOPE, "Debt", DEBT_GROUP),
        (GENERIC_HIDDEN_ENVELOPE, "Hidden", HIDDEN_GROUP),
    ]
    .into_iter()
    .map(|(id, description, group_id)| Envelope {
        id,
        description: description.into(),
        group_id,
        notes: String::new(),
        goal_amount: None,
        lifecycle: Lifecycle::committed(seed_timestamp()),
    })
    .collect()
}
