//! Service-level aging: whole days elapsed and a three-tier severity.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ticket::Ticket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingThresholds {
    warn_days: u32,
    crit_days: u32,
}

impl AgingThresholds {
    /// An inverted pair is corrected by raising `crit_days` to `warn_days`.
    pub fn new(warn_days: u32, crit_days: u32) -> Self {
        Self {
            warn_days,
            crit_days: crit_days.max(warn_days),
        }
    }

    pub fn warn_days(&self) -> u32 {
        self.warn_days
    }

    pub fn crit_days(&self) -> u32 {
        self.crit_days
    }
}

impl Default for AgingThresholds {
    fn default() -> Self {
        Self::new(3, 7)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgingClass {
    Fresh,
    Warning,
    Critical,
    Unknown,
}

impl AgingClass {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingReport {
    pub age_days: Option<i64>,
    pub class: AgingClass,
}

impl AgingReport {
    pub const UNKNOWN: Self = Self {
        age_days: None,
        class: AgingClass::Unknown,
    };
}

/// Classifies an already known day count. Negative counts are treated as zero.
pub fn classify_age(age_days: Option<i64>, thresholds: AgingThresholds) -> AgingReport {
    let Some(days) = age_days else {
        return AgingReport::UNKNOWN;
    };
    let days = days.max(0);
    let class = if days >= i64::from(thresholds.crit_days) {
        AgingClass::Critical
    } else if days >= i64::from(thresholds.warn_days) {
        AgingClass::Warning
    } else {
        AgingClass::Fresh
    };

    AgingReport {
        age_days: Some(days),
        class,
    }
}

/// Ages `created_at` against the current instant. Not cached: two calls in
/// different ticks may disagree across a day boundary.
pub fn compute_aging(
    created_at: Option<OffsetDateTime>,
    thresholds: AgingThresholds,
) -> AgingReport {
    compute_aging_at(created_at, thresholds, OffsetDateTime::now_utc())
}

pub fn compute_aging_at(
    created_at: Option<OffsetDateTime>,
    thresholds: AgingThresholds,
    now: OffsetDateTime,
) -> AgingReport {
    let age_days = created_at.map(|created| (now - created).whole_days());
    classify_age(age_days, thresholds)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketAging {
    pub ticket_age: AgingReport,
    pub status_age: AgingReport,
}

/// Ticket age and time-in-current-status, each against its own thresholds.
pub fn assess_ticket(
    ticket: &Ticket,
    age_thresholds: AgingThresholds,
    status_thresholds: AgingThresholds,
    now: OffsetDateTime,
) -> TicketAging {
    TicketAging {
        ticket_age: compute_aging_at(ticket.created_at, age_thresholds, now),
        status_age: classify_age(ticket.days_in_current_status, status_thresholds),
    }
}
