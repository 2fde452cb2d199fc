use std::sync::Arc;

use fieldops_config::{FieldopsConfig, FieldsConfigToml, TrackerRuntimeConfig};
use fieldops_domain::AgingThresholds;
use fieldops_engine::{
    BatchDispatcher, DispatchOptions, FieldMap, Normalizer, TicketEngine,
};
use fieldops_ticketing::{build_store, JiraConfig, RetryPolicy, TicketStore};
use time::{OffsetDateTime, UtcOffset};

use crate::cli::QueryArgs;
use crate::error::AppError;

/// Everything a command needs, built once from the loaded config.
#[derive(Clone)]
pub struct AppContext {
    pub config: FieldopsConfig,
    pub store: Arc<dyn TicketStore>,
    pub engine: TicketEngine,
    pub dispatcher: BatchDispatcher,
    pub target_offset: UtcOffset,
    pub age_thresholds: AgingThresholds,
    pub status_thresholds: AgingThresholds,
    pub now: OffsetDateTime,
}

impl AppContext {
    pub fn new(
        config: FieldopsConfig,
        store: Arc<dyn TicketStore>,
        now: OffsetDateTime,
    ) -> Result<Self, AppError> {
        let target_offset = config.target_offset()?;
        let normalizer = Normalizer::new(field_map(&config.fields), target_offset);
        let engine = TicketEngine::new(Arc::clone(&store), normalizer);
        let dispatcher = BatchDispatcher::new(
            Arc::clone(&store),
            DispatchOptions::new(
                config.dispatch.max_in_flight,
                config.fields.scheduled_at.clone(),
            ),
        );
        let age_thresholds = AgingThresholds::new(config.aging.warn_days, config.aging.crit_days);
        let status_thresholds = AgingThresholds::new(
            config.aging.status_warn_days,
            config.aging.status_crit_days,
        );

        Ok(Self {
            config,
            store,
            engine,
            dispatcher,
            target_offset,
            age_thresholds,
            status_thresholds,
            now,
        })
    }

    /// Saved queries named on the command line followed by ad hoc ones.
    /// With neither, every saved query runs.
    pub fn resolve_queries(&self, args: &QueryArgs) -> Result<Vec<String>, AppError> {
        let mut queries = Vec::new();
        for name in &args.queries {
            let saved = self.config.query(name).ok_or_else(|| {
                let known = self
                    .config
                    .queries
                    .iter()
                    .map(|query| query.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                AppError::Usage(format!(
                    "unknown saved query '{}'. Known queries: {known}",
                    name.trim()
                ))
            })?;
            queries.push(saved.jql.clone());
        }
        queries.extend(
            args.jql
                .iter()
                .map(|jql| jql.trim())
                .filter(|jql| !jql.is_empty())
                .map(ToOwned::to_owned),
        );

        if queries.is_empty() {
            queries = self
                .config
                .queries
                .iter()
                .map(|query| query.jql.clone())
                .collect();
        }
        if queries.is_empty() {
            return Err(AppError::Usage(
                "no query given and no [[queries]] configured. Pass --jql or add a saved query."
                    .to_owned(),
            ));
        }
        Ok(queries)
    }
}

pub fn build_tracker_store(config: &FieldopsConfig) -> Result<Arc<dyn TicketStore>, AppError> {
    let runtime = config.tracker_runtime();
    let jira = jira_config(&runtime).with_credentials_from_env()?;
    Ok(build_store(&runtime.provider, jira)?.into_shared())
}

pub fn jira_config(runtime: &TrackerRuntimeConfig) -> JiraConfig {
    JiraConfig {
        base_url: runtime.base_url.clone(),
        search_path: runtime.search_path.clone(),
        fetch_limit: runtime.fetch_limit,
        request_timeout: runtime.request_timeout,
        retry: RetryPolicy {
            max_attempts: runtime.max_attempts,
            initial_backoff: runtime.initial_backoff,
            max_backoff: runtime.max_backoff,
        },
        ..JiraConfig::default()
    }
}

pub fn field_map(fields: &FieldsConfigToml) -> FieldMap {
    FieldMap {
        status: fields.status.clone(),
        summary: fields.summary.clone(),
        full_description: fields.description.clone(),
        created_at: fields.created.clone(),
        store_id: fields.store_id.clone(),
        store_name: fields.store_name.clone(),
        device_slot: fields.device_slot.clone(),
        asset_type: fields.asset_type.clone(),
        problem_description: fields.problem_description.clone(),
        address: fields.address.clone(),
        city: fields.city.clone(),
        state: fields.state.clone(),
        zip: fields.zip.clone(),
        scheduled_at: fields.scheduled_at.clone(),
        days_in_current_status: fields.days_in_current_status.clone(),
    }
}
