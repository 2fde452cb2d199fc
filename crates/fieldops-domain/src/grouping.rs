//! Store and scheduled-date grouping. Both partitions place every input
//! ticket in exactly one group and keep fetch order inside a group.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use time::{Date, UtcOffset};

use crate::ticket::Ticket;

pub const UNDATED_LABEL: &str = "undated";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreGroup {
    pub store_id: String,
    pub store_name: String,
    pub tickets: Vec<Ticket>,
}

/// Groups by exact `store_id`; groups are returned in case-insensitive
/// lexicographic order of the id.
pub fn group_by_store(tickets: &[Ticket]) -> Vec<StoreGroup> {
    let mut index_by_store: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<StoreGroup> = Vec::new();

    for ticket in tickets {
        let position = *index_by_store
            .entry(ticket.store_id.as_str())
            .or_insert_with(|| {
                groups.push(StoreGroup {
                    store_id: ticket.store_id.clone(),
                    store_name: ticket.store_name.clone(),
                    tickets: Vec::new(),
                });
                groups.len() - 1
            });
        groups[position].tickets.push(ticket.clone());
    }

    groups.sort_by(|left, right| {
        left.store_id
            .to_lowercase()
            .cmp(&right.store_id.to_lowercase())
            .then_with(|| left.store_id.cmp(&right.store_id))
    });
    groups
}

/// Dated buckets order by calendar date; `Undated` sorts after all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BucketKey {
    Dated(Date),
    Undated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateBucket {
    pub key: BucketKey,
    pub label: String,
    pub tickets: Vec<Ticket>,
}

/// `DD/MM/YYYY` for dated buckets, [`UNDATED_LABEL`] otherwise.
pub fn bucket_label(key: BucketKey) -> String {
    match key {
        BucketKey::Dated(date) => format!(
            "{:02}/{:02}/{:04}",
            date.day(),
            u8::from(date.month()),
            date.year()
        ),
        BucketKey::Undated => UNDATED_LABEL.to_owned(),
    }
}

/// Buckets tickets by the calendar date of `scheduled_at` observed at
/// `target_offset`. Tickets without a usable schedule land in `Undated`.
pub fn group_by_date_bucket(tickets: &[Ticket], target_offset: UtcOffset) -> Vec<DateBucket> {
    let mut buckets: BTreeMap<BucketKey, Vec<Ticket>> = BTreeMap::new();
    for ticket in tickets {
        let key = ticket
            .scheduled_at
            .map(|instant| BucketKey::Dated(instant.to_offset(target_offset).date()))
            .unwrap_or(BucketKey::Undated);
        buckets.entry(key).or_default().push(ticket.clone());
    }

    buckets
        .into_iter()
        .map(|(key, tickets)| DateBucket {
            key,
            label: bucket_label(key),
            tickets,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::UNKNOWN_STORE_ID;
    use time::macros::{date, datetime, offset};

    fn store_ticket(key: &str, store_id: &str) -> Ticket {
        Ticket {
            store_id: store_id.to_owned(),
            store_name: format!("Store {store_id}"),
            ..Ticket::new(key)
        }
    }

    fn scheduled(key: &str, at: Option<time::OffsetDateTime>) -> Ticket {
        Ticket {
            scheduled_at: at,
            ..Ticket::new(key)
        }
    }

    fn keys(tickets: &[Ticket]) -> Vec<&str> {
        tickets.iter().map(|ticket| ticket.key.as_str()).collect()
    }

    #[test]
    fn group_by_store_partitions_every_ticket_once() {
        let tickets = vec![
            store_ticket("FS-1", "b12"),
            store_ticket("FS-2", "A07"),
            Ticket::new("FS-3"),
            store_ticket("FS-4", "b12"),
            store_ticket("FS-5", "a01"),
        ];

        let groups = group_by_store(&tickets);
        let mut regrouped: Vec<&str> = groups
            .iter()
            .flat_map(|group| keys(&group.tickets))
            .collect();
        regrouped.sort_unstable();
        assert_eq!(regrouped, vec!["FS-1", "FS-2", "FS-3", "FS-4", "FS-5"]);

        let order: Vec<&str> = groups.iter().map(|group| group.store_id.as_str()).collect();
        assert_eq!(order, vec!["a01", "A07", "b12", UNKNOWN_STORE_ID]);
        let b12 = groups
            .iter()
            .find(|group| group.store_id == "b12")
            .expect("b12 group");
        assert_eq!(keys(&b12.tickets), vec!["FS-1", "FS-4"]);
        assert_eq!(b12.store_name, "Store b12");
    }

    #[test]
    fn group_by_store_keeps_ids_differing_only_in_case_apart() {
        let tickets = vec![store_ticket("FS-1", "abc"), store_ticket("FS-2", "ABC")];
        let groups = group_by_store(&tickets);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].store_id, "ABC");
        assert_eq!(groups[1].store_id, "abc");
    }

    #[test]
    fn group_by_store_of_nothing_is_empty() {
        assert!(group_by_store(&[]).is_empty());
    }

    #[test]
    fn undated_bucket_sorts_last_regardless_of_first_seen_order() {
        let tickets = vec![
            scheduled("FS-1", None),
            scheduled("FS-2", Some(datetime!(2026-03-07 10:00 UTC))),
            scheduled("FS-3", Some(datetime!(2026-03-05 10:00 UTC))),
        ];

        let buckets = group_by_date_bucket(&tickets, offset!(UTC));
        let labels: Vec<&str> = buckets.iter().map(|bucket| bucket.label.as_str()).collect();
        assert_eq!(labels, vec!["05/03/2026", "07/03/2026", UNDATED_LABEL]);
        assert_eq!(keys(&buckets[2].tickets), vec!["FS-1"]);
    }

    #[test]
    fn buckets_use_the_target_offset_for_the_calendar_date() {
        let tickets = vec![scheduled("FS-1", Some(datetime!(2026-03-06 01:30 UTC)))];

        let utc = group_by_date_bucket(&tickets, offset!(UTC));
        assert_eq!(utc[0].key, BucketKey::Dated(date!(2026 - 03 - 06)));

        let sao_paulo = group_by_date_bucket(&tickets, offset!(-3));
        assert_eq!(sao_paulo[0].key, BucketKey::Dated(date!(2026 - 03 - 05)));
        assert_eq!(sao_paulo[0].label, "05/03/2026");
    }

    #[test]
    fn same_day_tickets_keep_fetch_order() {
        let tickets = vec![
            scheduled("FS-1", Some(datetime!(2026-03-05 16:00 UTC))),
            scheduled("FS-2", Some(datetime!(2026-03-05 08:00 UTC))),
            scheduled("FS-3", Some(datetime!(2026-03-05 12:00 UTC))),
        ];
        let buckets = group_by_date_bucket(&tickets, offset!(UTC));
        assert_eq!(buckets.len(), 1);
        assert_eq!(keys(&buckets[0].tickets), vec!["FS-1", "FS-2", "FS-3"]);
    }

    #[test]
    fn only_undated_tickets_yield_a_single_bucket() {
        let tickets = vec![scheduled("FS-1", None), scheduled("FS-2", None)];
        let buckets = group_by_date_bucket(&tickets, offset!(UTC));
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].key, BucketKey::Undated);
        assert_eq!(keys(&buckets[0].tickets), vec!["FS-1", "FS-2"]);
    }

    #[test]
    fn bucket_keys_order_dates_before_undated() {
        assert!(BucketKey::Dated(date!(9999 - 12 - 31)) < BucketKey::Undated);
        assert_eq!(bucket_label(BucketKey::Dated(date!(2026 - 01 - 02))), "02/01/2026");
    }
}
