use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Text stored for scalar fields the tracker left empty or null.
pub const FIELD_PLACEHOLDER: &str = "N/A";
/// Store id assigned when a record carries no store metadata.
pub const UNKNOWN_STORE_ID: &str = "UNKNOWN";
pub const UNKNOWN_STORE_NAME: &str = "Unknown store";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketKey(String);

impl TicketKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<String> for TicketKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TicketKey {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// One field-service request as seen in a single fetch cycle.
///
/// Scalar attributes never hold absence: missing source data is stored as
/// [`FIELD_PLACEHOLDER`] (or the unknown-store sentinels). Only the two
/// timestamps and the externally supplied status counter stay optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub key: TicketKey,
    pub status: String,
    pub store_id: String,
    pub store_name: String,
    pub device_slot: String,
    pub asset_type: String,
    pub problem_description: String,
    pub summary: String,
    pub full_description: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub scheduled_at: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_in_current_status: Option<i64>,
}

impl Ticket {
    /// A ticket with every defaultable field set to its placeholder.
    pub fn new(key: impl Into<TicketKey>) -> Self {
        let placeholder = || FIELD_PLACEHOLDER.to_owned();
        Self {
            key: key.into(),
            status: placeholder(),
            store_id: UNKNOWN_STORE_ID.to_owned(),
            store_name: UNKNOWN_STORE_NAME.to_owned(),
            device_slot: placeholder(),
            asset_type: placeholder(),
            problem_description: placeholder(),
            summary: placeholder(),
            full_description: placeholder(),
            address: placeholder(),
            city: placeholder(),
            state: placeholder(),
            zip: placeholder(),
            created_at: None,
            scheduled_at: None,
            days_in_current_status: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn new_ticket_uses_placeholders_and_unknown_store() {
        let ticket = Ticket::new("FS-1");
        assert_eq!(ticket.key.as_str(), "FS-1");
        assert_eq!(ticket.address, FIELD_PLACEHOLDER);
        assert_eq!(ticket.store_id, UNKNOWN_STORE_ID);
        assert!(ticket.created_at.is_none());
    }

    #[test]
    fn ticket_serializes_timestamps_as_rfc3339() {
        let ticket = Ticket {
            scheduled_at: Some(datetime!(2026-03-05 09:30 -3)),
            ..Ticket::new("FS-2")
        };
        let encoded = serde_json::to_value(&ticket).expect("serialize ticket");
        assert_eq!(encoded["key"], "FS-2");
        assert_eq!(encoded["scheduled_at"], "2026-03-05T09:30:00-03:00");
        assert!(encoded.get("days_in_current_status").is_none());

        let decoded: Ticket = serde_json::from_value(encoded).expect("deserialize ticket");
        assert_eq!(decoded, ticket);
    }
}
