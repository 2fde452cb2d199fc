use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde_json::Value;

use super::config::JiraConfig;
use super::retry::{run_with_retry, AttemptFailure, RetryPolicy};
use crate::interface::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JiraMethod {
    Get,
    Post,
    Put,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JiraRequest {
    pub method: JiraMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl JiraRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: JiraMethod::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: JiraMethod::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: JiraMethod::Put,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }
}

/// HTTP seam of the tracker client. Returns the decoded JSON body, or
/// `Value::Null` for empty success responses.
#[async_trait]
pub trait JiraTransport: Send + Sync {
    async fn execute(&self, request: JiraRequest) -> Result<Value, CoreError>;
}

#[derive(Clone)]
pub struct ReqwestJiraTransport {
    config: JiraConfig,
    client: Client,
}

impl fmt::Debug for ReqwestJiraTransport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ReqwestJiraTransport")
            .field("config", &self.config)
            .field("client", &self.client)
            .finish()
    }
}

impl ReqwestJiraTransport {
    pub fn new(config: JiraConfig) -> Result<Self, CoreError> {
        let client = Client::builder()
            .user_agent("fieldops/ticketing")
            .timeout(config.request_timeout)
            .build()
            .map_err(|error| {
                CoreError::Configuration(format!("failed to build tracker HTTP client: {error}"))
            })?;

        Ok(Self { config, client })
    }

    async fn attempt(&self, request: &JiraRequest) -> Result<Value, AttemptFailure> {
        let url = self.config.endpoint(&request.path);
        let mut builder = match request.method {
            JiraMethod::Get => self.client.get(&url),
            JiraMethod::Post => self.client.post(&url),
            JiraMethod::Put => self.client.put(&url),
        };
        builder = builder
            .basic_auth(&self.config.username, Some(&self.config.api_token))
            .header(header::ACCEPT, "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|error| {
            let error_message =
                CoreError::DependencyUnavailable(format!("tracker request failed: {error}"));
            if error.is_builder() {
                AttemptFailure::Fatal(error_message)
            } else {
                AttemptFailure::Retryable {
                    error: error_message,
                    retry_after: None,
                }
            }
        })?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers().get(header::RETRY_AFTER));
        let body = response.text().await.map_err(|error| AttemptFailure::Retryable {
            error: CoreError::DependencyUnavailable(format!(
                "tracker response read failed: {error}"
            )),
            retry_after: None,
        })?;

        classify_response(status, retry_after, &body)
    }
}

#[async_trait]
impl JiraTransport for ReqwestJiraTransport {
    async fn execute(&self, request: JiraRequest) -> Result<Value, CoreError> {
        let policy = self.config.retry;
        run_with_retry(&policy, &request.path, |_| self.attempt(&request)).await
    }
}

fn classify_response(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> Result<Value, AttemptFailure> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(AttemptFailure::Fatal(CoreError::Unauthorized(format!(
            "HTTP {}: {}",
            status.as_u16(),
            truncate_for_error(body)
        ))));
    }
    if !status.is_success() {
        let error = CoreError::Remote {
            status: status.as_u16(),
            body: truncate_for_error(body),
        };
        if RetryPolicy::is_retryable_status(status.as_u16()) {
            return Err(AttemptFailure::Retryable { error, retry_after });
        }
        return Err(AttemptFailure::Fatal(error));
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(body).map_err(|error| {
        AttemptFailure::Fatal(CoreError::Decode(format!(
            "tracker response was malformed JSON: {error}"
        )))
    })
}

fn parse_retry_after(value: Option<&header::HeaderValue>) -> Option<Duration> {
    value
        .and_then(|raw| raw.to_str().ok())
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

pub(crate) fn truncate_for_error(body: &str) -> String {
    const MAX_LEN: usize = 200;
    if body.chars().count() <= MAX_LEN {
        body.to_owned()
    } else {
        format!("{}...", body.chars().take(MAX_LEN).collect::<String>())
    }
}
