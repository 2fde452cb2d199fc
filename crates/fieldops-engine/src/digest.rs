//! Per-store view combining grouping, aging and duplicate flags.

use std::collections::BTreeSet;

use fieldops_domain::{
    assess_ticket, find_duplicate_signatures, group_by_store, AgingClass, AgingThresholds,
    Signature, Ticket, TicketAging,
};
use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketDigest {
    pub ticket: Ticket,
    pub aging: TicketAging,
    pub duplicate: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AgingCounts {
    pub fresh: usize,
    pub warning: usize,
    pub critical: usize,
    pub unknown: usize,
}

impl AgingCounts {
    fn record(&mut self, class: AgingClass) {
        match class {
            AgingClass::Fresh => self.fresh += 1,
            AgingClass::Warning => self.warning += 1,
            AgingClass::Critical => self.critical += 1,
            AgingClass::Unknown => self.unknown += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreDigest {
    pub store_id: String,
    pub store_name: String,
    pub tickets: Vec<TicketDigest>,
    pub duplicate_signatures: BTreeSet<Signature>,
    /// Ticket-age classes only.
    pub counts: AgingCounts,
}

/// Stores in display order. Duplicates are detected within each store only.
pub fn build_store_digests(
    tickets: &[Ticket],
    age_thresholds: AgingThresholds,
    status_thresholds: AgingThresholds,
    now: OffsetDateTime,
) -> Vec<StoreDigest> {
    group_by_store(tickets)
        .into_iter()
        .map(|group| {
            let duplicate_signatures = find_duplicate_signatures(&group.tickets);
            let mut counts = AgingCounts::default();
            let tickets = group
                .tickets
                .into_iter()
                .map(|ticket| {
                    let aging = assess_ticket(&ticket, age_thresholds, status_thresholds, now);
                    counts.record(aging.ticket_age.class);
                    let duplicate = duplicate_signatures.contains(&Signature::of(&ticket));
                    TicketDigest {
                        ticket,
                        aging,
                        duplicate,
                    }
                })
                .collect();
            StoreDigest {
                store_id: group.store_id,
                store_name: group.store_name,
                tickets,
                duplicate_signatures,
                counts,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::build_store_digests;
    use fieldops_domain::{AgingClass, AgingThresholds, Ticket};
    use time::macros::datetime;
    use time::Duration;

    fn ticket(key: &str, store: &str, slot: &str, asset: &str, age_days: i64) -> Ticket {
        let mut ticket = Ticket::new(key);
        ticket.store_id = store.to_owned();
        ticket.store_name = format!("Store {store}");
        ticket.device_slot = slot.to_owned();
        ticket.asset_type = asset.to_owned();
        ticket.created_at = Some(datetime!(2026-06-15 12:00 UTC) - Duration::days(age_days));
        ticket
    }

    #[test]
    fn digests_flag_duplicates_and_count_aging_per_store() {
        let now = datetime!(2026-06-15 12:00 UTC);
        let mut undated = ticket("FS-5", "b02", "01", "Scanner", 0);
        undated.created_at = None;
        undated.days_in_current_status = Some(9);
        let tickets = vec![
            ticket("FS-1", "B02", "05", "Printer", 1),
            ticket("FS-2", "a01", "05", "Printer", 10),
            ticket("FS-3", "B02", " 05 ", "printer", 4),
            ticket("FS-4", "B02", "06", "Scanner", 8),
            undated,
        ];

        let digests = build_store_digests(
            &tickets,
            AgingThresholds::new(3, 7),
            AgingThresholds::new(2, 5),
            now,
        );
        let ids: Vec<&str> = digests.iter().map(|digest| digest.store_id.as_str()).collect();
        assert_eq!(ids, vec!["a01", "B02", "b02"]);

        let a01 = &digests[0];
        assert!(a01.duplicate_signatures.is_empty());
        assert!(!a01.tickets[0].duplicate);
        assert_eq!(a01.counts.critical, 1);

        let b02 = &digests[1];
        assert_eq!(b02.duplicate_signatures.len(), 1);
        let flags: Vec<bool> = b02.tickets.iter().map(|digest| digest.duplicate).collect();
        assert_eq!(flags, vec![true, true, false]);
        assert_eq!(b02.counts.fresh, 1);
        assert_eq!(b02.counts.warning, 1);
        assert_eq!(b02.counts.critical, 1);

        let lower = &digests[2].tickets[0];
        assert_eq!(lower.aging.ticket_age.class, AgingClass::Unknown);
        assert_eq!(lower.aging.status_age.class, AgingClass::Critical);
        assert_eq!(digests[2].counts.unknown, 1);
    }
}
