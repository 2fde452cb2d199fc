use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use fieldops_domain::{CoreError, Ticket, TicketKey};
use fieldops_ticketing::{RawIssue, SearchRequest, TicketStore};
use thiserror::Error;
use time::Date;
use tracing::{debug, warn};

use crate::normalization::{NormalizationError, Normalizer};

/// Upper bound on keys in one `key in (...)` lookup.
const MAX_KEYS_PER_LOOKUP: usize = 100;

/// A search that could not be completed. Never produced for an empty result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to fetch tickets for `{query}`: {source}")]
pub struct FetchError {
    pub query: String,
    #[source]
    pub source: CoreError,
}

/// A raw record dropped during normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    pub query: String,
    pub position: usize,
    pub error: NormalizationError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOutcome {
    pub tickets: Vec<Ticket>,
    pub rejected: Vec<RejectedRecord>,
}

/// Keeps the first occurrence of each key, preserving order.
pub fn merge_unique(batches: impl IntoIterator<Item = Vec<Ticket>>) -> Vec<Ticket> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for ticket in batches.into_iter().flatten() {
        if seen.insert(ticket.key.clone()) {
            merged.push(ticket);
        }
    }
    merged
}

#[derive(Clone)]
pub struct TicketEngine {
    store: Arc<dyn TicketStore>,
    normalizer: Normalizer,
}

impl TicketEngine {
    pub fn new(store: Arc<dyn TicketStore>, normalizer: Normalizer) -> Self {
        Self { store, normalizer }
    }

    pub fn store(&self) -> Arc<dyn TicketStore> {
        Arc::clone(&self.store)
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub async fn fetch_and_normalize(&self, query: &str) -> Result<FetchOutcome, FetchError> {
        let issues = self.search(query, None).await?;
        Ok(self.normalize_page(query, &issues))
    }

    /// Runs each query in turn and merges the results first-seen-wins. One
    /// failed query fails the whole call.
    pub async fn fetch_many<Q>(&self, queries: &[Q]) -> Result<FetchOutcome, FetchError>
    where
        Q: AsRef<str>,
    {
        let mut pages = Vec::with_capacity(queries.len());
        let mut rejected = Vec::new();
        for query in queries {
            let outcome = self.fetch_and_normalize(query.as_ref()).await?;
            pages.push(outcome.tickets);
            rejected.extend(outcome.rejected);
        }
        let tickets = merge_unique(pages);
        debug!(
            queries = queries.len(),
            tickets = tickets.len(),
            rejected = rejected.len(),
            "merged ticket queries"
        );
        Ok(FetchOutcome { tickets, rejected })
    }

    /// Last-known scheduled date per key, as a calendar date in the target
    /// offset. Keys without a scheduled date are absent from the map.
    ///
    /// Keys are looked up in chunks no larger than one store page so every
    /// requested key can come back.
    pub async fn current_schedule(
        &self,
        keys: &[TicketKey],
    ) -> Result<BTreeMap<TicketKey, Date>, FetchError> {
        let chunk_size = self
            .store
            .max_page_size()
            .map_or(MAX_KEYS_PER_LOOKUP, |limit| {
                (limit as usize).clamp(1, MAX_KEYS_PER_LOOKUP)
            });
        let offset = self.normalizer.target_offset();
        let mut schedule = BTreeMap::new();
        for chunk in keys.chunks(chunk_size) {
            let query = key_list_query(chunk).map_err(|source| FetchError {
                query: "key in (...)".to_owned(),
                source,
            })?;
            let issues = self.search(&query, Some(chunk.len() as u32)).await?;
            let outcome = self.normalize_page(&query, &issues);
            schedule.extend(outcome.tickets.into_iter().filter_map(|ticket| {
                let date = ticket.scheduled_at?.to_offset(offset).date();
                Some((ticket.key, date))
            }));
        }
        debug!(
            keys = keys.len(),
            scheduled = schedule.len(),
            "looked up current schedule"
        );
        Ok(schedule)
    }

    async fn search(&self, query: &str, limit: Option<u32>) -> Result<Vec<RawIssue>, FetchError> {
        let mut request = SearchRequest::new(query, self.normalizer.field_map().requested_fields());
        request.limit = limit;
        self.store
            .search(request)
            .await
            .map_err(|source| FetchError {
                query: query.to_owned(),
                source,
            })
    }

    fn normalize_page(&self, query: &str, issues: &[RawIssue]) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();
        for (position, issue) in issues.iter().enumerate() {
            match self.normalizer.normalize(issue) {
                Ok(ticket) => outcome.tickets.push(ticket),
                Err(error) => {
                    warn!(query, position, %error, "dropping tracker record without a key");
                    outcome.rejected.push(RejectedRecord {
                        query: query.to_owned(),
                        position,
                        error,
                    });
                }
            }
        }
        outcome
    }
}

fn key_list_query(keys: &[TicketKey]) -> Result<String, CoreError> {
    for key in keys {
        let valid = !key.as_str().is_empty()
            && key
                .as_str()
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !valid {
            return Err(CoreError::Configuration(format!(
                "ticket key `{key}` contains unsupported characters"
            )));
        }
    }
    let list = keys
        .iter()
        .map(TicketKey::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("key in ({list})"))
}

#[cfg(test)]
mod tests {
    use super::{key_list_query, merge_unique};
    use fieldops_domain::{CoreError, Ticket, TicketKey};

    #[test]
    fn merge_keeps_first_seen_copy() {
        let mut first = Ticket::new("FS-1");
        first.summary = "from query one".to_owned();
        let mut again = Ticket::new("FS-1");
        again.summary = "from query two".to_owned();

        let merged = merge_unique(vec![
            vec![first, Ticket::new("FS-2")],
            vec![again, Ticket::new("FS-3")],
        ]);
        let keys: Vec<&str> = merged.iter().map(|ticket| ticket.key.as_str()).collect();
        assert_eq!(keys, vec!["FS-1", "FS-2", "FS-3"]);
        assert_eq!(merged[0].summary, "from query one");
    }

    #[test]
    fn key_list_query_rejects_injection() {
        assert_eq!(
            key_list_query(&[TicketKey::new("FS-1"), TicketKey::new("FS_2")]).as_deref(),
            Ok("key in (FS-1, FS_2)")
        );
        assert!(matches!(
            key_list_query(&[TicketKey::new("FS-1) OR (project = X")]),
            Err(CoreError::Configuration(_))
        ));
        assert!(key_list_query(&[TicketKey::new("")]).is_err());
    }
}
