use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::UtcOffset;

pub const ENV_FIELDOPS_CONFIG: &str = "FIELDOPS_CONFIG";

const DEFAULT_TRACKER_PROVIDER: &str = "tracker.jira";
const DEFAULT_SEARCH_PATH: &str = "rest/api/2/search";
const DEFAULT_FETCH_LIMIT: u32 = 100;
const MAX_FETCH_LIMIT: u32 = 1000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;
const DEFAULT_MAX_BACKOFF_MS: u64 = 8_000;
const DEFAULT_UTC_OFFSET: &str = "-03:00";
const DEFAULT_WARN_DAYS: u32 = 3;
const DEFAULT_CRIT_DAYS: u32 = 7;
const DEFAULT_STATUS_WARN_DAYS: u32 = 2;
const DEFAULT_STATUS_CRIT_DAYS: u32 = 5;
const DEFAULT_MAX_IN_FLIGHT: usize = 4;
const DEFAULT_QUERY_NAME: &str = "open";
const DEFAULT_QUERY_JQL: &str = "statusCategory != Done ORDER BY created ASC";

const UTC_OFFSET_FORMAT: &[FormatItem<'static>] =
    format_description!("[offset_hour sign:mandatory]:[offset_minute]");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Message(String),
}

impl ConfigError {
    fn configuration(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldopsConfig {
    #[serde(default = "default_tracker_provider")]
    pub tracker_provider: String,
    #[serde(default)]
    pub tracker: TrackerConfigToml,
    #[serde(default)]
    pub fields: FieldsConfigToml,
    #[serde(default)]
    pub schedule: ScheduleConfigToml,
    #[serde(default)]
    pub aging: AgingConfigToml,
    #[serde(default)]
    pub dispatch: DispatchConfigToml,
    #[serde(default = "default_queries")]
    pub queries: Vec<SavedQuery>,
    #[serde(default)]
    pub logging: LoggingConfigToml,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerRuntimeConfig {
    pub provider: String,
    pub base_url: String,
    pub search_path: String,
    pub fetch_limit: u32,
    pub request_timeout: Duration,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl FieldopsConfig {
    pub fn tracker_runtime(&self) -> TrackerRuntimeConfig {
        TrackerRuntimeConfig {
            provider: self.tracker_provider.clone(),
            base_url: self.tracker.base_url.clone(),
            search_path: self.tracker.search_path.clone(),
            fetch_limit: self.tracker.fetch_limit,
            request_timeout: Duration::from_secs(self.tracker.request_timeout_secs),
            max_attempts: self.tracker.max_attempts,
            initial_backoff: Duration::from_millis(self.tracker.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.tracker.max_backoff_ms),
        }
    }

    pub fn target_offset(&self) -> Result<UtcOffset, ConfigError> {
        parse_utc_offset(&self.schedule.utc_offset)
    }

    pub fn query(&self, name: &str) -> Option<&SavedQuery> {
        let name = name.trim();
        self.queries
            .iter()
            .find(|query| query.name.eq_ignore_ascii_case(name))
    }
}

pub fn load_from_env() -> Result<FieldopsConfig, ConfigError> {
    let path = config_path_from_env()?;
    load_from_path(path)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<FieldopsConfig, ConfigError> {
    load_or_create_config(path.as_ref())
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = resolve_home_dir().ok_or_else(|| {
        ConfigError::configuration("Unable to resolve home directory from HOME or USERPROFILE")
    })?;

    Ok(home.join(".config").join("fieldops").join("config.toml"))
}

pub fn config_path_from_env() -> Result<PathBuf, ConfigError> {
    match std::env::var(ENV_FIELDOPS_CONFIG) {
        Ok(raw) => {
            if raw.trim().is_empty() {
                default_config_path()
            } else {
                Ok(raw.into())
            }
        }
        Err(std::env::VarError::NotPresent) => default_config_path(),
        Err(_) => Err(ConfigError::configuration(
            "FIELDOPS_CONFIG contained invalid UTF-8",
        )),
    }
}

fn default_fieldops_data_dir() -> PathBuf {
    resolve_data_local_dir().join("fieldops")
}

fn resolve_data_local_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(path) = std::env::var("LOCALAPPDATA") {
            let path = path.trim();
            if !path.is_empty() {
                return absolutize_path(PathBuf::from(path));
            }
        }
        if let Some(home) = resolve_home_dir() {
            return home.join("AppData").join("Local");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = resolve_home_dir() {
            return home.join("Library").join("Application Support");
        }
    }

    #[cfg(all(not(target_os = "windows"), not(target_os = "macos")))]
    {
        if let Ok(path) = std::env::var("XDG_DATA_HOME") {
            let path = path.trim();
            if !path.is_empty() {
                return absolutize_path(PathBuf::from(path));
            }
        }
        if let Some(home) = resolve_home_dir() {
            return home.join(".local").join("share");
        }
    }

    std::env::temp_dir()
}

fn resolve_home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("USERPROFILE")
                .ok()
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
}

fn absolutize_path(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }

    if let Ok(current) = std::env::current_dir() {
        return current.join(path);
    }

    std::env::temp_dir().join(path)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackerConfigToml {
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_search_path")]
    pub search_path: String,
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for TrackerConfigToml {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            search_path: default_search_path(),
            fetch_limit: default_fetch_limit(),
            request_timeout_secs: default_request_timeout_secs(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Raw tracker field ids, one per canonical ticket attribute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FieldsConfigToml {
    pub status: String,
    pub summary: String,
    pub description: String,
    pub created: String,
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

impl Default for FieldsConfigToml {
    fn default() -> Self {
        Self {
            status: "status".to_owned(),
            summary: "summary".to_owned(),
            description: "description".to_owned(),
            created: "created".to_owned(),
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

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleConfigToml {
    /// Fixed offset of the target time zone, `+HH:MM` or `-HH:MM`.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

impl Default for ScheduleConfigToml {
    fn default() -> Self {
        Self {
            utc_offset: default_utc_offset(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgingConfigToml {
    #[serde(default = "default_warn_days")]
    pub warn_days: u32,
    #[serde(default = "default_crit_days")]
    pub crit_days: u32,
    #[serde(default = "default_status_warn_days")]
    pub status_warn_days: u32,
    #[serde(default = "default_status_crit_days")]
    pub status_crit_days: u32,
}

impl Default for AgingConfigToml {
    fn default() -> Self {
        Self {
            warn_days: default_warn_days(),
            crit_days: default_crit_days(),
            status_warn_days: default_status_warn_days(),
            status_crit_days: default_status_crit_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchConfigToml {
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for DispatchConfigToml {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedQuery {
    pub name: String,
    pub jql: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfigToml {
    #[serde(default = "default_log_file")]
    pub file: String,
}

impl Default for LoggingConfigToml {
    fn default() -> Self {
        Self {
            file: default_log_file(),
        }
    }
}

fn default_tracker_provider() -> String {
    DEFAULT_TRACKER_PROVIDER.to_owned()
}

fn default_search_path() -> String {
    DEFAULT_SEARCH_PATH.to_owned()
}

fn default_fetch_limit() -> u32 {
    DEFAULT_FETCH_LIMIT
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_initial_backoff_ms() -> u64 {
    DEFAULT_INITIAL_BACKOFF_MS
}

fn default_max_backoff_ms() -> u64 {
    DEFAULT_MAX_BACKOFF_MS
}

fn default_utc_offset() -> String {
    DEFAULT_UTC_OFFSET.to_owned()
}

fn default_warn_days() -> u32 {
    DEFAULT_WARN_DAYS
}

fn default_crit_days() -> u32 {
    DEFAULT_CRIT_DAYS
}

fn default_status_warn_days() -> u32 {
    DEFAULT_STATUS_WARN_DAYS
}

fn default_status_crit_days() -> u32 {
    DEFAULT_STATUS_CRIT_DAYS
}

fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}

fn default_queries() -> Vec<SavedQuery> {
    vec![SavedQuery {
        name: DEFAULT_QUERY_NAME.to_owned(),
        jql: DEFAULT_QUERY_JQL.to_owned(),
    }]
}

fn default_log_file() -> String {
    default_fieldops_data_dir()
        .join("fieldops.log")
        .to_string_lossy()
        .to_string()
}

impl Default for FieldopsConfig {
    fn default() -> Self {
        Self {
            tracker_provider: default_tracker_provider(),
            tracker: TrackerConfigToml::default(),
            fields: FieldsConfigToml::default(),
            schedule: ScheduleConfigToml::default(),
            aging: AgingConfigToml::default(),
            dispatch: DispatchConfigToml::default(),
            queries: default_queries(),
            logging: LoggingConfigToml::default(),
        }
    }
}

fn persist_config(path: &Path, config: &FieldopsConfig) -> Result<(), ConfigError> {
    let rendered = toml::to_string_pretty(config).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to serialize FIELDOPS_CONFIG for {}: {err}",
            path.display()
        ))
    })?;

    std::fs::write(path, rendered.as_bytes()).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to write FIELDOPS_CONFIG to {}: {err}",
            path.display()
        ))
    })
}

fn load_or_create_config(path: &Path) -> Result<FieldopsConfig, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|err| {
                        ConfigError::configuration(format!(
                            "Failed to create parent directory {} for FIELDOPS_CONFIG: {err}",
                            parent.display()
                        ))
                    })?;
                }
            }

            let default_config = FieldopsConfig::default();
            persist_config(path, &default_config)?;
            return Ok(default_config);
        }
        Err(err) => {
            return Err(ConfigError::configuration(format!(
                "Failed to read FIELDOPS_CONFIG from {}: {err}",
                path.display()
            )));
        }
    };

    let mut config: FieldopsConfig = toml::from_str(&raw).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to parse FIELDOPS_CONFIG from {}: {err}",
            path.display()
        ))
    })?;

    let changed = normalize_config(&mut config)?;
    if changed {
        persist_config(path, &config)?;
    }

    Ok(config)
}

fn normalize_config(config: &mut FieldopsConfig) -> Result<bool, ConfigError> {
    let mut changed = false;

    changed |= normalize_provider_selection(
        &mut config.tracker_provider,
        DEFAULT_TRACKER_PROVIDER,
        "tracker_provider",
        "tracker",
    )?;
    changed |= normalize_tracker_config(&mut config.tracker);
    changed |= normalize_fields_config(&mut config.fields);
    changed |= normalize_utc_offset(&mut config.schedule.utc_offset)?;
    changed |= normalize_aging_config(&mut config.aging);

    let normalized_max_in_flight = if config.dispatch.max_in_flight == 0 {
        default_max_in_flight()
    } else {
        config.dispatch.max_in_flight.clamp(1, 16)
    };
    if normalized_max_in_flight != config.dispatch.max_in_flight {
        config.dispatch.max_in_flight = normalized_max_in_flight;
        changed = true;
    }

    changed |= normalize_saved_queries(&mut config.queries);
    changed |= normalize_non_empty_string(&mut config.logging.file, default_log_file());

    Ok(changed)
}

pub fn normalize_tracker_config(config: &mut TrackerConfigToml) -> bool {
    let mut changed = false;

    let base_url = config.base_url.trim().trim_end_matches('/').to_owned();
    if base_url != config.base_url {
        config.base_url = base_url;
        changed = true;
    }
    changed |= normalize_non_empty_string(&mut config.search_path, default_search_path());

    let normalized_fetch_limit = if config.fetch_limit == 0 {
        default_fetch_limit()
    } else {
        config.fetch_limit.clamp(1, MAX_FETCH_LIMIT)
    };
    if normalized_fetch_limit != config.fetch_limit {
        config.fetch_limit = normalized_fetch_limit;
        changed = true;
    }

    let normalized_request_timeout_secs = if config.request_timeout_secs == 0 {
        default_request_timeout_secs()
    } else {
        config.request_timeout_secs.clamp(1, 300)
    };
    if normalized_request_timeout_secs != config.request_timeout_secs {
        config.request_timeout_secs = normalized_request_timeout_secs;
        changed = true;
    }

    let normalized_max_attempts = if config.max_attempts == 0 {
        default_max_attempts()
    } else {
        config.max_attempts.clamp(1, 10)
    };
    if normalized_max_attempts != config.max_attempts {
        config.max_attempts = normalized_max_attempts;
        changed = true;
    }

    let normalized_initial_backoff_ms = if config.initial_backoff_ms == 0 {
        default_initial_backoff_ms()
    } else {
        config.initial_backoff_ms.clamp(10, 60_000)
    };
    if normalized_initial_backoff_ms != config.initial_backoff_ms {
        config.initial_backoff_ms = normalized_initial_backoff_ms;
        changed = true;
    }

    let normalized_max_backoff_ms = config
        .max_backoff_ms
        .clamp(config.initial_backoff_ms, 300_000);
    if normalized_max_backoff_ms != config.max_backoff_ms {
        config.max_backoff_ms = normalized_max_backoff_ms;
        changed = true;
    }

    changed
}

fn normalize_fields_config(config: &mut FieldsConfigToml) -> bool {
    let defaults = FieldsConfigToml::default();
    let mut changed = false;
    changed |= normalize_non_empty_string(&mut config.status, defaults.status);
    changed |= normalize_non_empty_string(&mut config.summary, defaults.summary);
    changed |= normalize_non_empty_string(&mut config.description, defaults.description);
    changed |= normalize_non_empty_string(&mut config.created, defaults.created);
    changed |= normalize_non_empty_string(&mut config.store_id, defaults.store_id);
    changed |= normalize_non_empty_string(&mut config.store_name, defaults.store_name);
    changed |= normalize_non_empty_string(&mut config.device_slot, defaults.device_slot);
    changed |= normalize_non_empty_string(&mut config.asset_type, defaults.asset_type);
    changed |= normalize_non_empty_string(
        &mut config.problem_description,
        defaults.problem_description,
    );
    changed |= normalize_non_empty_string(&mut config.address, defaults.address);
    changed |= normalize_non_empty_string(&mut config.city, defaults.city);
    changed |= normalize_non_empty_string(&mut config.state, defaults.state);
    changed |= normalize_non_empty_string(&mut config.zip, defaults.zip);
    changed |= normalize_non_empty_string(&mut config.scheduled_at, defaults.scheduled_at);
    changed |= normalize_non_empty_string(
        &mut config.days_in_current_status,
        defaults.days_in_current_status,
    );
    changed
}

/// Inverted pairs are corrected by raising the critical threshold.
pub fn normalize_aging_config(config: &mut AgingConfigToml) -> bool {
    let mut changed = false;
    if config.crit_days < config.warn_days {
        config.crit_days = config.warn_days;
        changed = true;
    }
    if config.status_crit_days < config.status_warn_days {
        config.status_crit_days = config.status_warn_days;
        changed = true;
    }
    changed
}

fn normalize_utc_offset(value: &mut String) -> Result<bool, ConfigError> {
    let trimmed = value.trim();
    let canonical = if trimmed.is_empty() {
        default_utc_offset()
    } else if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        "+00:00".to_owned()
    } else {
        parse_utc_offset(trimmed)?;
        trimmed.to_owned()
    };

    if *value != canonical {
        *value = canonical;
        return Ok(true);
    }
    Ok(false)
}

pub fn parse_utc_offset(value: &str) -> Result<UtcOffset, ConfigError> {
    UtcOffset::parse(value.trim(), UTC_OFFSET_FORMAT).map_err(|err| {
        ConfigError::configuration(format!(
            "Invalid `schedule.utc_offset` value '{}' in FIELDOPS_CONFIG: expected `+HH:MM` or `-HH:MM` ({err}).",
            value.trim()
        ))
    })
}

/// Trims entries, drops blank ones and keeps the first of any repeated name.
fn normalize_saved_queries(queries: &mut Vec<SavedQuery>) -> bool {
    let mut normalized: Vec<SavedQuery> = Vec::with_capacity(queries.len());
    for query in queries.iter() {
        let name = query.name.trim();
        let jql = query.jql.trim();
        if name.is_empty() || jql.is_empty() {
            continue;
        }
        if normalized
            .iter()
            .any(|existing| existing.name.eq_ignore_ascii_case(name))
        {
            continue;
        }
        normalized.push(SavedQuery {
            name: name.to_owned(),
            jql: jql.to_owned(),
        });
    }

    if *queries != normalized {
        *queries = normalized;
        return true;
    }
    false
}

fn normalize_provider_selection(
    value: &mut String,
    default: &str,
    field_name: &str,
    provider_namespace: &str,
) -> Result<bool, ConfigError> {
    let normalized = value.trim().to_ascii_lowercase();
    let canonical = if normalized.is_empty() {
        default.to_owned()
    } else {
        normalized
    };
    let expected_prefix = format!("{provider_namespace}.");

    if !canonical.starts_with(expected_prefix.as_str()) {
        return Err(ConfigError::configuration(format!(
            "Invalid `{field_name}` value '{canonical}' in FIELDOPS_CONFIG: provider keys must be namespaced under `{expected_prefix}*` (for example `{default}`)."
        )));
    }
    let suffix = canonical[expected_prefix.len()..].trim();
    if suffix.is_empty()
        || !suffix
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' || ch == '-')
    {
        return Err(ConfigError::configuration(format!(
            "Invalid `{field_name}` value '{canonical}' in FIELDOPS_CONFIG: expected format `{provider_namespace}.<provider_key>` using lowercase letters, digits, `_` or `-`."
        )));
    }

    if *value != canonical {
        *value = canonical;
        return Ok(true);
    }

    Ok(false)
}

fn normalize_non_empty_string(value: &mut String, default: String) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        if *value != default {
            *value = default;
            return true;
        }
        return false;
    }

    if trimmed != value {
        *value = trimmed.to_owned();
        return true;
    }
    false
}
