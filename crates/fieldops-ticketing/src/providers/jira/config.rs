use std::fmt;
use std::time::Duration;

use super::retry::RetryPolicy;
use crate::interface::CoreError;

pub(crate) const DEFAULT_SEARCH_PATH: &str = "rest/api/2/search";
pub(crate) const DEFAULT_FETCH_LIMIT: u32 = 100;
pub(crate) const MAX_FETCH_LIMIT: u32 = 1000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;
pub const ENV_TRACKER_USER: &str = "FIELDOPS_TRACKER_USER";
pub const ENV_TRACKER_API_TOKEN: &str = "FIELDOPS_TRACKER_API_TOKEN";

#[derive(Clone, PartialEq, Eq)]
pub struct JiraConfig {
    pub base_url: String,
    pub username: String,
    pub api_token: String,
    pub search_path: String,
    pub fetch_limit: u32,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl fmt::Debug for JiraConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("JiraConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("api_token", &"<redacted>")
            .field("search_path", &self.search_path)
            .field("fetch_limit", &self.fetch_limit)
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            api_token: String::new(),
            search_path: DEFAULT_SEARCH_PATH.to_owned(),
            fetch_limit: DEFAULT_FETCH_LIMIT,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

impl JiraConfig {
    /// Fills credentials from `FIELDOPS_TRACKER_USER` and
    /// `FIELDOPS_TRACKER_API_TOKEN`. Both must be present and non-blank.
    pub fn with_credentials_from_env(mut self) -> Result<Self, CoreError> {
        self.username = required_env(ENV_TRACKER_USER)?;
        self.api_token = required_env(ENV_TRACKER_API_TOKEN)?;
        Ok(self)
    }

    pub(crate) fn validate(&self) -> Result<(), CoreError> {
        if self.base_url.trim().is_empty() {
            return Err(CoreError::Configuration(
                "tracker base_url is empty. Set [tracker].base_url in the config file.".to_owned(),
            ));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(CoreError::Configuration(format!(
                "tracker base_url `{}` must start with http:// or https://",
                self.base_url
            )));
        }
        if self.fetch_limit == 0 || self.fetch_limit > MAX_FETCH_LIMIT {
            return Err(CoreError::Configuration(format!(
                "tracker fetch_limit must be between 1 and {MAX_FETCH_LIMIT}."
            )));
        }
        Ok(())
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let suffix = path.trim_start_matches('/');
        format!("{base}/{suffix}")
    }
}

fn required_env(name: &str) -> Result<String, CoreError> {
    let value = std::env::var(name).map_err(|_| {
        CoreError::Configuration(format!(
            "{name} is not set. Export it before talking to the tracker."
        ))
    })?;
    let value = value.trim();
    if value.is_empty() {
        return Err(CoreError::Configuration(format!(
            "{name} is empty. Provide a non-empty value."
        )));
    }
    Ok(value.to_owned())
}
