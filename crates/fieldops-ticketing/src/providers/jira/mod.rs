mod config;
mod retry;
mod transport;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::interface::{
    CoreError, FieldUpdate, IssueTransition, RawIssue, SearchRequest, TicketKey, TicketStore,
    TicketStoreKind,
};
pub use config::{JiraConfig, ENV_TRACKER_API_TOKEN, ENV_TRACKER_USER};
pub use retry::RetryPolicy;
pub use transport::{JiraMethod, JiraRequest, JiraTransport, ReqwestJiraTransport};

const ISSUE_PATH: &str = "rest/api/2/issue";
const MYSELF_PATH: &str = "rest/api/2/myself";

#[derive(Clone)]
pub struct JiraTicketStore {
    config: JiraConfig,
    transport: Arc<dyn JiraTransport>,
}

impl fmt::Debug for JiraTicketStore {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("JiraTicketStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl JiraTicketStore {
    pub fn new(config: JiraConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let transport = ReqwestJiraTransport::new(config.clone())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: JiraConfig, transport: Arc<dyn JiraTransport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &JiraConfig {
        &self.config
    }

    fn page_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.config.fetch_limit)
            .clamp(1, self.config.fetch_limit.max(1))
    }
}

#[async_trait]
impl TicketStore for JiraTicketStore {
    fn kind(&self) -> TicketStoreKind {
        TicketStoreKind::Jira
    }

    fn max_page_size(&self) -> Option<u32> {
        Some(self.config.fetch_limit.max(1))
    }

    async fn health_check(&self) -> Result<(), CoreError> {
        let payload = self.transport.execute(JiraRequest::get(MYSELF_PATH)).await?;
        if payload.get("accountId").is_none() && payload.get("name").is_none() {
            return Err(CoreError::Decode(
                "tracker health check succeeded but did not identify the API user.".to_owned(),
            ));
        }
        Ok(())
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<RawIssue>, CoreError> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(CoreError::Configuration(
                "tracker search requires a non-empty query.".to_owned(),
            ));
        }

        let page_size = self.page_size(request.limit);
        let payload = self
            .transport
            .execute(JiraRequest::post(
                self.config.search_path.as_str(),
                json!({
                    "jql": query,
                    "fields": request.fields,
                    "maxResults": page_size,
                    "startAt": 0,
                }),
            ))
            .await?;

        let page: SearchPage = decode(payload, "search")?;
        if let Some(total) = page.total {
            if total > page.issues.len() as u64 {
                warn!(
                    query,
                    returned = page.issues.len(),
                    total,
                    "tracker search truncated to one page"
                );
            }
        }
        debug!(query, returned = page.issues.len(), "tracker search completed");
        Ok(page.issues.into_iter().map(raw_issue).collect())
    }

    async fn list_transitions(&self, key: &TicketKey) -> Result<Vec<IssueTransition>, CoreError> {
        let key = validated_key(key)?;
        let payload = self
            .transport
            .execute(JiraRequest::get(format!("{ISSUE_PATH}/{key}/transitions")))
            .await?;
        let listing: TransitionListing = decode(payload, "transition listing")?;

        Ok(listing
            .transitions
            .into_iter()
            .map(|transition| IssueTransition {
                id: transition.id,
                name: transition.name,
                to_status: transition.to.and_then(|status| status.name),
            })
            .collect())
    }

    async fn apply_transition(
        &self,
        key: &TicketKey,
        transition_id: &str,
    ) -> Result<(), CoreError> {
        let key = validated_key(key)?;
        let transition_id = transition_id.trim();
        if transition_id.is_empty() {
            return Err(CoreError::Configuration(
                "tracker transitions require a non-empty transition id.".to_owned(),
            ));
        }

        debug!(key, transition_id, "applying tracker transition");
        self.transport
            .execute(JiraRequest::post(
                format!("{ISSUE_PATH}/{key}/transitions"),
                json!({ "transition": { "id": transition_id } }),
            ))
            .await?;
        Ok(())
    }

    async fn apply_field_update(
        &self,
        key: &TicketKey,
        update: FieldUpdate,
    ) -> Result<(), CoreError> {
        let key = validated_key(key)?;
        if update.is_empty() {
            return Err(CoreError::Configuration(
                "tracker field updates require at least one field.".to_owned(),
            ));
        }

        debug!(key, fields = update.fields.len(), "applying tracker field update");
        self.transport
            .execute(JiraRequest::put(
                format!("{ISSUE_PATH}/{key}"),
                json!({ "fields": update.fields }),
            ))
            .await?;
        Ok(())
    }
}

/// Keys are interpolated into request paths, so only tracker key characters
/// are accepted.
fn validated_key(key: &TicketKey) -> Result<&str, CoreError> {
    let raw = key.as_str().trim();
    if raw.is_empty() {
        return Err(CoreError::Configuration(
            "ticket key cannot be empty.".to_owned(),
        ));
    }
    if !raw
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(CoreError::Configuration(format!(
            "ticket key `{raw}` contains unsupported characters."
        )));
    }
    Ok(raw)
}

fn decode<T: for<'de> Deserialize<'de>>(payload: Value, what: &str) -> Result<T, CoreError> {
    serde_json::from_value(payload)
        .map_err(|error| CoreError::Decode(format!("tracker {what} payload: {error}")))
}

/// Records are read one by one so a malformed entry surfaces downstream as a
/// keyless record instead of failing the page.
fn raw_issue(value: Value) -> RawIssue {
    let Value::Object(mut record) = value else {
        return RawIssue::default();
    };
    let key = record
        .get("key")
        .and_then(Value::as_str)
        .map(str::to_owned);
    let fields = match record.remove("fields") {
        Some(Value::Object(fields)) => fields,
        _ => Map::new(),
    };
    RawIssue { key, fields }
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    issues: Vec<Value>,
    #[serde(default)]
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TransitionListing {
    #[serde(default)]
    transitions: Vec<TransitionNode>,
}

#[derive(Debug, Deserialize)]
struct TransitionNode {
    id: String,
    name: String,
    #[serde(default)]
    to: Option<TransitionTarget>,
}

#[derive(Debug, Deserialize)]
struct TransitionTarget {
    #[serde(default)]
    name: Option<String>,
}
