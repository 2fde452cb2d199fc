//! Canonical field-service ticket model and the pure computations over it:
//! store and date grouping, duplicate signatures and SLA aging.

pub mod aging;
pub mod duplicates;
pub mod error;
pub mod grouping;
pub mod ticket;

pub use aging::{
    assess_ticket, classify_age, compute_aging, compute_aging_at, AgingClass, AgingReport,
    AgingThresholds, TicketAging,
};
pub use duplicates::{duplicate_groups, find_duplicate_signatures, Signature};
pub use error::CoreError;
pub use grouping::{
    bucket_label, group_by_date_bucket, group_by_store, BucketKey, DateBucket, StoreGroup,
    UNDATED_LABEL,
};
pub use ticket::{Ticket, TicketKey, FIELD_PLACEHOLDER, UNKNOWN_STORE_ID, UNKNOWN_STORE_NAME};
