//! Ticket aggregation and batch dispatch over a [`TicketStore`].
//!
//! [`TicketStore`]: fieldops_ticketing::TicketStore

pub mod digest;
pub mod dispatch;
pub mod fetch;
pub mod normalization;

pub use digest::{build_store_digests, AgingCounts, StoreDigest, TicketDigest};
pub use dispatch::{
    detect_conflicts, plan_reschedule, BatchDispatcher, BatchResult, CancellationToken,
    DispatchError, DispatchOptions, KeyFailure, RescheduleConflict, RescheduleOutcome,
    ReschedulePlan, RescheduleRequest, ResolutionMode,
};
pub use fetch::{merge_unique, FetchError, FetchOutcome, RejectedRecord, TicketEngine};
pub use normalization::{
    parse_timestamp, FieldMap, FieldValue, NormalizationError, Normalizer,
};
