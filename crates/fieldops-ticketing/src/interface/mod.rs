use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use fieldops_domain::{CoreError, TicketKey};

/// One issue exactly as the tracker returned it: an optional key plus the
/// nested field map. Interpretation belongs to the normalizer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawIssue {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl RawIssue {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub fields: Vec<String>,
    pub limit: Option<u32>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            query: query.into(),
            fields,
            limit: None,
        }
    }
}

/// A workflow edge currently available on one issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueTransition {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_status: Option<String>,
}

impl IssueTransition {
    /// Matches either the transition name or its destination status,
    /// ignoring case and surrounding whitespace.
    pub fn leads_to(&self, target_status: &str) -> bool {
        let target = target_status.trim();
        if target.is_empty() {
            return false;
        }
        self.name.trim().eq_ignore_ascii_case(target)
            || self
                .to_status
                .as_deref()
                .is_some_and(|status| status.trim().eq_ignore_ascii_case(target))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub fields: Map<String, Value>,
}

impl FieldUpdate {
    pub fn single(field: impl Into<String>, value: Value) -> Self {
        let mut fields = Map::new();
        fields.insert(field.into(), value);
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketStoreKind {
    Jira,
}

impl TicketStoreKind {
    pub const fn as_key(self) -> &'static str {
        match self {
            Self::Jira => "tracker.jira",
        }
    }

    pub fn from_key(store_key: &str) -> Option<Self> {
        match store_key {
            "tracker.jira" => Some(Self::Jira),
            _ => None,
        }
    }
}

/// Remote issue tracker capability. Implementations are shared behind an
/// `Arc` by concurrent fetches and batch dispatches.
#[async_trait]
pub trait TicketStore: Send + Sync {
    fn kind(&self) -> TicketStoreKind;
    async fn health_check(&self) -> Result<(), CoreError>;
    /// At most one bounded page. An empty result is not an error.
    async fn search(&self, request: SearchRequest) -> Result<Vec<RawIssue>, CoreError>;
    async fn list_transitions(&self, key: &TicketKey) -> Result<Vec<IssueTransition>, CoreError>;
    async fn apply_transition(&self, key: &TicketKey, transition_id: &str)
        -> Result<(), CoreError>;
    async fn apply_field_update(&self, key: &TicketKey, update: FieldUpdate)
        -> Result<(), CoreError>;

    fn store_key(&self) -> &'static str {
        self.kind().as_key()
    }

    /// Largest page one `search` call can return, when the store caps it.
    fn max_page_size(&self) -> Option<u32> {
        None
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TicketStoreError {
    #[error("unknown ticket store key: {0}")]
    UnknownStoreKey(String),
    #[error("failed to initialize ticket store: {0}")]
    StoreInitialization(String),
}

#[cfg(test)]
mod tests {
    use super::{FieldUpdate, IssueTransition, RawIssue, TicketStoreKind};
    use serde_json::json;

    #[test]
    fn store_key_mapping_matches_enum_values() {
        assert_eq!(
            TicketStoreKind::from_key("tracker.jira"),
            Some(TicketStoreKind::Jira)
        );
        assert_eq!(TicketStoreKind::Jira.as_key(), "tracker.jira");
        assert_eq!(TicketStoreKind::from_key("jira"), None);
    }

    #[test]
    fn transition_matches_name_or_destination_status() {
        let transition = IssueTransition {
            id: "31".to_owned(),
            name: "Schedule visit".to_owned(),
            to_status: Some("Scheduled".to_owned()),
        };
        assert!(transition.leads_to("scheduled"));
        assert!(transition.leads_to(" SCHEDULE VISIT "));
        assert!(!transition.leads_to("In Field"));
        assert!(!transition.leads_to("   "));
    }

    #[test]
    fn raw_issue_tolerates_missing_members() {
        let issue: RawIssue = serde_json::from_value(json!({ "id": "1001" })).expect("decode");
        assert!(issue.key.is_none());
        assert!(issue.fields.is_empty());

        let issue: RawIssue = serde_json::from_value(json!({
            "key": "FS-1",
            "fields": { "summary": "POS down" }
        }))
        .expect("decode");
        assert_eq!(issue.field("summary"), Some(&json!("POS down")));
    }

    #[test]
    fn field_update_single_holds_one_field() {
        let update = FieldUpdate::single("customfield_10109", json!("2026-03-05"));
        assert!(!update.is_empty());
        assert_eq!(update.fields.len(), 1);
        assert!(FieldUpdate::default().is_empty());
    }
}
