//! Batch Dispatcher: one mutation call per key, bounded in-flight calls,
//! per-key outcomes collected back into input order.

mod conflicts;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fieldops_domain::TicketKey;
use fieldops_ticketing::{FieldUpdate, TicketStore};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use time::Date;
use tracing::{debug, info, warn};

pub use conflicts::{
    detect_conflicts, plan_reschedule, RescheduleConflict, ReschedulePlan, RescheduleRequest,
    ResolutionMode,
};

pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;
pub const MAX_IN_FLIGHT_LIMIT: usize = 16;
pub const DEFAULT_SCHEDULED_FIELD: &str = "customfield_10109";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("nothing to do: {0}")]
    NothingToDo(String),
    #[error("{} ticket(s) already scheduled for another date", .0.len())]
    ConflictDetected(Vec<RescheduleConflict>),
    #[error("invalid batch request: {0}")]
    InvalidRequest(String),
}

/// Stops issuing further per-key calls once cancelled. Calls already sent
/// run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOptions {
    pub max_in_flight: usize,
    /// Tracker field written by a reschedule.
    pub scheduled_field: String,
}

impl DispatchOptions {
    pub fn new(max_in_flight: usize, scheduled_field: impl Into<String>) -> Self {
        Self {
            max_in_flight: max_in_flight.clamp(1, MAX_IN_FLIGHT_LIMIT),
            scheduled_field: scheduled_field.into(),
        }
    }
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IN_FLIGHT, DEFAULT_SCHEDULED_FIELD)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyFailure {
    pub key: TicketKey,
    pub reason: String,
}

/// `succeeded + failures.len() + not_dispatched.len() == total`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub total: usize,
    pub succeeded: usize,
    pub failures: Vec<KeyFailure>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_dispatched: Vec<TicketKey>,
}

impl BatchResult {
    pub fn is_complete_success(&self) -> bool {
        self.succeeded == self.total
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RescheduleOutcome {
    /// Aborted by the caller; no remote call was made.
    Cancelled { conflicts: Vec<RescheduleConflict> },
    Applied {
        result: BatchResult,
        conflicts: Vec<RescheduleConflict>,
        skipped: Vec<TicketKey>,
    },
}

enum Mutation<'a> {
    Transition { target_status: &'a str },
    Reschedule { update: FieldUpdate },
}

impl Mutation<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::Transition { .. } => "transition",
            Self::Reschedule { .. } => "reschedule",
        }
    }
}

enum KeyOutcome {
    Succeeded,
    Failed(String),
    NotDispatched,
}

#[derive(Clone)]
pub struct BatchDispatcher {
    store: Arc<dyn TicketStore>,
    options: DispatchOptions,
}

impl BatchDispatcher {
    pub fn new(store: Arc<dyn TicketStore>, options: DispatchOptions) -> Self {
        let options = DispatchOptions::new(options.max_in_flight, options.scheduled_field);
        Self { store, options }
    }

    pub async fn batch_reschedule(
        &self,
        request: &RescheduleRequest,
        mode: Option<ResolutionMode>,
    ) -> Result<RescheduleOutcome, DispatchError> {
        self.batch_reschedule_with_cancel(request, mode, &CancellationToken::new())
            .await
    }

    pub async fn batch_reschedule_with_cancel(
        &self,
        request: &RescheduleRequest,
        mode: Option<ResolutionMode>,
        cancel: &CancellationToken,
    ) -> Result<RescheduleOutcome, DispatchError> {
        if self.options.scheduled_field.trim().is_empty() {
            return Err(DispatchError::InvalidRequest(
                "scheduled date field is not configured".to_owned(),
            ));
        }
        match plan_reschedule(request, mode)? {
            ReschedulePlan::Cancelled { conflicts } => {
                info!(
                    conflicts = conflicts.len(),
                    "reschedule aborted on conflicts"
                );
                Ok(RescheduleOutcome::Cancelled { conflicts })
            }
            ReschedulePlan::Proceed {
                keys,
                conflicts,
                skipped,
            } => {
                let mutation = Mutation::Reschedule {
                    update: FieldUpdate::single(
                        self.options.scheduled_field.clone(),
                        json!(calendar_date(request.new_date)),
                    ),
                };
                let result = self.run(keys, &mutation, cancel).await;
                Ok(RescheduleOutcome::Applied {
                    result,
                    conflicts,
                    skipped,
                })
            }
        }
    }

    pub async fn batch_transition(
        &self,
        keys: &[TicketKey],
        target_status: &str,
    ) -> Result<BatchResult, DispatchError> {
        self.batch_transition_with_cancel(keys, target_status, &CancellationToken::new())
            .await
    }

    pub async fn batch_transition_with_cancel(
        &self,
        keys: &[TicketKey],
        target_status: &str,
        cancel: &CancellationToken,
    ) -> Result<BatchResult, DispatchError> {
        let target_status = target_status.trim();
        if target_status.is_empty() {
            return Err(DispatchError::InvalidRequest(
                "target status must not be empty".to_owned(),
            ));
        }
        let keys = unique_keys(keys);
        if keys.is_empty() {
            return Err(DispatchError::NothingToDo(
                "no ticket keys were given".to_owned(),
            ));
        }
        Ok(self
            .run(keys, &Mutation::Transition { target_status }, cancel)
            .await)
    }

    async fn run(
        &self,
        keys: Vec<TicketKey>,
        mutation: &Mutation<'_>,
        cancel: &CancellationToken,
    ) -> BatchResult {
        let total = keys.len();
        let mut outcomes: Vec<(usize, TicketKey, KeyOutcome)> =
            stream::iter(keys.into_iter().enumerate())
                .map(|(position, key)| async move {
                    if cancel.is_cancelled() {
                        return (position, key, KeyOutcome::NotDispatched);
                    }
                    let outcome = match self.dispatch_one(&key, mutation).await {
                        Ok(()) => KeyOutcome::Succeeded,
                        Err(reason) => KeyOutcome::Failed(reason),
                    };
                    (position, key, outcome)
                })
                .buffer_unordered(self.options.max_in_flight)
                .collect()
                .await;
        outcomes.sort_by_key(|(position, _, _)| *position);

        let mut result = BatchResult {
            total,
            ..BatchResult::default()
        };
        for (_, key, outcome) in outcomes {
            match outcome {
                KeyOutcome::Succeeded => result.succeeded += 1,
                KeyOutcome::Failed(reason) => {
                    warn!(
                        operation = mutation.name(),
                        key = %key,
                        %reason,
                        "ticket mutation failed"
                    );
                    result.failures.push(KeyFailure { key, reason });
                }
                KeyOutcome::NotDispatched => result.not_dispatched.push(key),
            }
        }
        info!(
            operation = mutation.name(),
            total = result.total,
            succeeded = result.succeeded,
            failed = result.failures.len(),
            not_dispatched = result.not_dispatched.len(),
            "batch finished"
        );
        result
    }

    async fn dispatch_one(&self, key: &TicketKey, mutation: &Mutation<'_>) -> Result<(), String> {
        debug!(operation = mutation.name(), key = %key, "dispatching ticket mutation");
        match mutation {
            Mutation::Transition { target_status } => {
                let transitions = self
                    .store
                    .list_transitions(key)
                    .await
                    .map_err(|error| error.reason())?;
                let Some(transition) = transitions
                    .iter()
                    .find(|transition| transition.leads_to(target_status))
                else {
                    let available = transitions
                        .iter()
                        .map(|transition| transition.name.as_str())
                        .collect::<Vec<_>>();
                    return Err(if available.is_empty() {
                        format!("no transition to `{target_status}` is available")
                    } else {
                        format!(
                            "no transition to `{target_status}` is available (available: {})",
                            available.join(", ")
                        )
                    });
                };
                self.store
                    .apply_transition(key, &transition.id)
                    .await
                    .map_err(|error| error.reason())
            }
            Mutation::Reschedule { update } => self
                .store
                .apply_field_update(key, update.clone())
                .await
                .map_err(|error| error.reason()),
        }
    }
}

/// First occurrence wins; blank keys are dropped.
pub(crate) fn unique_keys(keys: &[TicketKey]) -> Vec<TicketKey> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(keys.len());
    for key in keys {
        if !key.as_str().trim().is_empty() && seen.insert(key) {
            unique.push(key.clone());
        }
    }
    unique
}

fn calendar_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}
