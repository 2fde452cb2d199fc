//! Probable duplicate detection inside one store's ticket list.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::ticket::{Ticket, TicketKey};

/// Normalized `(device_slot, asset_type)` pair. Placeholders are compared
/// like any other value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Signature {
    pub device_slot: String,
    pub asset_type: String,
}

impl Signature {
    pub fn new(device_slot: &str, asset_type: &str) -> Self {
        Self {
            device_slot: normalize_component(device_slot),
            asset_type: normalize_component(asset_type),
        }
    }

    pub fn of(ticket: &Ticket) -> Self {
        Self::new(&ticket.device_slot, &ticket.asset_type)
    }
}

fn normalize_component(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Signatures shared by two or more tickets of `tickets`.
pub fn find_duplicate_signatures(tickets: &[Ticket]) -> BTreeSet<Signature> {
    duplicate_groups(tickets).into_keys().collect()
}

/// Colliding signatures with the keys that share them, in fetch order.
pub fn duplicate_groups(tickets: &[Ticket]) -> BTreeMap<Signature, Vec<TicketKey>> {
    let mut by_signature: BTreeMap<Signature, Vec<TicketKey>> = BTreeMap::new();
    for ticket in tickets {
        by_signature
            .entry(Signature::of(ticket))
            .or_default()
            .push(ticket.key.clone());
    }
    by_signature.retain(|_, keys| keys.len() > 1);
    by_signature
}
