//! Reschedule conflict detection and resolution, kept free of I/O so the
//! caller can ask for a decision between detection and execution.

use std::collections::BTreeMap;

use fieldops_domain::TicketKey;
use serde::{Deserialize, Serialize};
use time::Date;

use super::{unique_keys, DispatchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMode {
    Abort,
    OverwriteAll,
    SkipConflicting,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleConflict {
    pub key: TicketKey,
    pub current_date: Date,
    pub requested_date: Date,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RescheduleRequest {
    pub keys: Vec<TicketKey>,
    pub new_date: Date,
    /// Best effort: keys missing here are never conflicts.
    pub current_dates: BTreeMap<TicketKey, Date>,
}

impl RescheduleRequest {
    pub fn new(keys: Vec<TicketKey>, new_date: Date) -> Self {
        Self {
            keys,
            new_date,
            current_dates: BTreeMap::new(),
        }
    }

    pub fn with_current_dates(mut self, current_dates: BTreeMap<TicketKey, Date>) -> Self {
        self.current_dates = current_dates;
        self
    }
}

/// Keys whose known scheduled date differs from the requested one, in input
/// order.
pub fn detect_conflicts(request: &RescheduleRequest) -> Vec<RescheduleConflict> {
    unique_keys(&request.keys)
        .into_iter()
        .filter_map(|key| {
            let current_date = *request.current_dates.get(&key)?;
            (current_date != request.new_date).then(|| RescheduleConflict {
                key,
                current_date,
                requested_date: request.new_date,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReschedulePlan {
    Cancelled {
        conflicts: Vec<RescheduleConflict>,
    },
    Proceed {
        keys: Vec<TicketKey>,
        conflicts: Vec<RescheduleConflict>,
        skipped: Vec<TicketKey>,
    },
}

/// Finalizes the key set. Without a mode, any conflict is returned as
/// [`DispatchError::ConflictDetected`] and nothing proceeds.
pub fn plan_reschedule(
    request: &RescheduleRequest,
    mode: Option<ResolutionMode>,
) -> Result<ReschedulePlan, DispatchError> {
    let keys = unique_keys(&request.keys);
    if keys.is_empty() {
        return Err(DispatchError::NothingToDo(
            "no ticket keys were given".to_owned(),
        ));
    }

    let conflicts = detect_conflicts(request);
    if conflicts.is_empty() {
        return Ok(ReschedulePlan::Proceed {
            keys,
            conflicts,
            skipped: Vec::new(),
        });
    }

    match mode {
        None => Err(DispatchError::ConflictDetected(conflicts)),
        Some(ResolutionMode::Abort) => Ok(ReschedulePlan::Cancelled { conflicts }),
        Some(ResolutionMode::OverwriteAll) => Ok(ReschedulePlan::Proceed {
            keys,
            conflicts,
            skipped: Vec::new(),
        }),
        Some(ResolutionMode::SkipConflicting) => {
            let (skipped, keys): (Vec<TicketKey>, Vec<TicketKey>) = keys
                .into_iter()
                .partition(|key| conflicts.iter().any(|conflict| &conflict.key == key));
            if keys.is_empty() {
                return Err(DispatchError::NothingToDo(format!(
                    "all {} ticket(s) conflict with their current schedule",
                    skipped.len()
                )));
            }
            Ok(ReschedulePlan::Proceed {
                keys,
                conflicts,
                skipped,
            })
        }
    }
}
