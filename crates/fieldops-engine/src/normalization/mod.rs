//! Raw tracker record to canonical [`Ticket`].

use fieldops_domain::{
    Ticket, TicketKey, FIELD_PLACEHOLDER, UNKNOWN_STORE_ID, UNKNOWN_STORE_NAME,
};
use fieldops_ticketing::RawIssue;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};
use tracing::debug;

const TRACKER_TIMESTAMP_MILLIS: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory][offset_minute]"
);
const TRACKER_TIMESTAMP: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory][offset_minute]"
);
const CALENDAR_DATE: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

const CHOICE_LABEL_MEMBERS: [&str; 4] = ["label", "value", "name", "displayName"];

/// Tracker field ids feeding each canonical attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMap {
    pub status: String,
    pub summary: String,
    pub full_description: String,
    pub created_at: String,
    pub store_id: String,
    pub store_name: String,
    pub device_slot: String,
    pub asset_type: String,
    pub problem_description: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub scheduled_at: String,
    pub days_in_current_status: String,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            status: "status".to_owned(),
            summary: "summary".to_owned(),
            full_description: "description".to_owned(),
            created_at: "created".to_owned(),
            store_id: "customfield_10100".to_owned(),
            store_name: "customfield_10101".to_owned(),
            device_slot: "customfield_10102".to_owned(),
            asset_type: "customfield_10103".to_owned(),
            problem_description: "customfield_10104".to_owned(),
            address: "customfield_10105".to_owned(),
            city: "customfield_10106".to_owned(),
            state: "customfield_10107".to_owned(),
            zip: "customfield_10108".to_owned(),
            scheduled_at: "customfield_10109".to_owned(),
            days_in_current_status: "customfield_10110".to_owned(),
        }
    }
}

impl FieldMap {
    /// Field ids to request from a search, without duplicates.
    pub fn requested_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = Vec::new();
        for field in [
            &self.status,
            &self.summary,
            &self.full_description,
            &self.created_at,
            &self.store_id,
            &self.store_name,
            &self.device_slot,
            &self.asset_type,
            &self.problem_description,
            &self.address,
            &self.city,
            &self.state,
            &self.zip,
            &self.scheduled_at,
            &self.days_in_current_status,
        ] {
            if !field.is_empty() && !fields.contains(field) {
                fields.push(field.clone());
            }
        }
        fields
    }
}

/// A tracker field after resolving the scalar vs labeled-choice duality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Missing,
    Scalar(String),
    Choice { value: Option<String>, label: String },
}

impl FieldValue {
    pub fn resolve(raw: Option<&Value>) -> Self {
        match raw {
            None | Some(Value::Null) => Self::Missing,
            Some(Value::String(text)) => scalar(text),
            Some(Value::Number(number)) => Self::Scalar(number.to_string()),
            Some(Value::Bool(flag)) => Self::Scalar(flag.to_string()),
            Some(Value::Object(members)) => {
                let label = CHOICE_LABEL_MEMBERS.iter().find_map(|member| {
                    members
                        .get(*member)
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|text| !text.is_empty())
                });
                let Some(label) = label else {
                    return Self::Missing;
                };
                let value = ["id", "value"]
                    .iter()
                    .find_map(|member| match members.get(*member) {
                        Some(Value::String(text)) => Some(text.clone()),
                        Some(Value::Number(number)) => Some(number.to_string()),
                        _ => None,
                    });
                Self::Choice {
                    value,
                    label: label.to_owned(),
                }
            }
            Some(Value::Array(items)) => {
                let labels: Vec<String> = items
                    .iter()
                    .filter_map(|item| Self::resolve(Some(item)).text().map(ToOwned::to_owned))
                    .collect();
                if labels.is_empty() {
                    Self::Missing
                } else {
                    Self::Scalar(labels.join(", "))
                }
            }
        }
    }

    /// Human-readable text: the label of a choice, the scalar itself.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Missing => None,
            Self::Scalar(text) => Some(text),
            Self::Choice { label, .. } => Some(label),
        }
    }

    fn text_or(&self, fallback: &str) -> String {
        self.text().unwrap_or(fallback).to_owned()
    }
}

fn scalar(text: &str) -> FieldValue {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        FieldValue::Missing
    } else {
        FieldValue::Scalar(trimmed.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    #[error("record has no ticket key")]
    MissingKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalizer {
    field_map: FieldMap,
    target_offset: UtcOffset,
}

impl Normalizer {
    pub fn new(field_map: FieldMap, target_offset: UtcOffset) -> Self {
        Self {
            field_map,
            target_offset,
        }
    }

    pub fn field_map(&self) -> &FieldMap {
        &self.field_map
    }

    pub fn target_offset(&self) -> UtcOffset {
        self.target_offset
    }

    /// Fails only when the record lacks a usable key; every other gap is
    /// filled with a placeholder or left as `None`.
    pub fn normalize(&self, issue: &RawIssue) -> Result<Ticket, NormalizationError> {
        let key = issue
            .key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(NormalizationError::MissingKey)?;

        let map = &self.field_map;
        let field = |name: &str| FieldValue::resolve(issue.field(name));
        let text = |name: &str| field(name).text_or(FIELD_PLACEHOLDER);

        let store_id_value = field(&map.store_id);
        let store_id = store_id_value.text_or(UNKNOWN_STORE_ID);
        let store_name = field(&map.store_name)
            .text()
            .or(store_id_value.text())
            .unwrap_or(UNKNOWN_STORE_NAME)
            .to_owned();

        Ok(Ticket {
            key: TicketKey::new(key),
            status: text(&map.status),
            store_id,
            store_name,
            device_slot: text(&map.device_slot),
            asset_type: text(&map.asset_type),
            problem_description: text(&map.problem_description),
            summary: text(&map.summary),
            full_description: text(&map.full_description),
            address: text(&map.address),
            city: text(&map.city),
            state: text(&map.state),
            zip: text(&map.zip),
            created_at: self.timestamp(key, &map.created_at, field(&map.created_at)),
            scheduled_at: self.timestamp(key, &map.scheduled_at, field(&map.scheduled_at)),
            days_in_current_status: day_count(field(&map.days_in_current_status)),
        })
    }

    fn timestamp(&self, key: &str, field: &str, value: FieldValue) -> Option<OffsetDateTime> {
        let text = value.text()?;
        let parsed = parse_timestamp(text, self.target_offset);
        if parsed.is_none() {
            debug!(ticket = key, field, value = text, "ignoring unparsable tracker timestamp");
        }
        parsed
    }
}

/// Accepts RFC 3339, the tracker's `+hhmm` offset form (with or without
/// fractional seconds), and bare calendar dates taken as midnight at
/// `date_offset`.
pub fn parse_timestamp(text: &str, date_offset: UtcOffset) -> Option<OffsetDateTime> {
    let text = text.trim();
    if let Ok(instant) = OffsetDateTime::parse(text, &Rfc3339) {
        return Some(instant);
    }
    if let Ok(instant) = OffsetDateTime::parse(text, TRACKER_TIMESTAMP_MILLIS) {
        return Some(instant);
    }
    if let Ok(instant) = OffsetDateTime::parse(text, TRACKER_TIMESTAMP) {
        return Some(instant);
    }
    Date::parse(text, CALENDAR_DATE)
        .ok()
        .map(|date| PrimitiveDateTime::new(date, time::Time::MIDNIGHT).assume_offset(date_offset))
}

fn day_count(value: FieldValue) -> Option<i64> {
    let days = value.text()?.parse::<f64>().ok()?;
    if !days.is_finite() || days < 0.0 {
        return None;
    }
    Some(days.floor() as i64)
}
