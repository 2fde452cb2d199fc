use std::sync::Arc;

use crate::interface::{TicketStore, TicketStoreError, TicketStoreKind};
use crate::providers::jira::{JiraConfig, JiraTicketStore};

const SUPPORTED_STORE_KEYS: [&str; 1] = [TicketStoreKind::Jira.as_key()];

#[derive(Debug, Clone)]
pub enum TicketStoreFactoryOutput {
    Jira(JiraTicketStore),
}

impl TicketStoreFactoryOutput {
    pub fn into_shared(self) -> Arc<dyn TicketStore> {
        match self {
            Self::Jira(store) => Arc::new(store),
        }
    }
}

pub fn supported_store_keys() -> &'static [&'static str] {
    &SUPPORTED_STORE_KEYS
}

pub fn resolve_store_kind(store_key: &str) -> Result<TicketStoreKind, TicketStoreError> {
    TicketStoreKind::from_key(store_key)
        .ok_or_else(|| TicketStoreError::UnknownStoreKey(store_key.to_owned()))
}

pub fn build_store(
    store_key: &str,
    config: JiraConfig,
) -> Result<TicketStoreFactoryOutput, TicketStoreError> {
    let kind = resolve_store_kind(store_key)?;
    let store = match kind {
        TicketStoreKind::Jira => TicketStoreFactoryOutput::Jira(
            JiraTicketStore::new(config)
                .map_err(|error| TicketStoreError::StoreInitialization(error.to_string()))?,
        ),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::{build_store, resolve_store_kind, supported_store_keys, TicketStoreFactoryOutput};
    use crate::interface::{TicketStoreError, TicketStoreKind};
    use crate::providers::jira::JiraConfig;

    #[test]
    fn supported_store_keys_roundtrip_through_kind_resolution() {
        for key in supported_store_keys() {
            let kind = resolve_store_kind(key).expect("resolve key");
            assert_eq!(kind.as_key(), *key);
        }
    }

    #[test]
    fn resolve_store_kind_rejects_unknown_keys() {
        let error = resolve_store_kind("jira").expect_err("reject bare key");
        assert_eq!(error.to_string(), "unknown ticket store key: jira");
    }

    #[test]
    fn build_store_returns_jira_variant() {
        let config = JiraConfig {
            base_url: "https://tracker.example.com".to_owned(),
            ..JiraConfig::default()
        };
        let store = build_store("tracker.jira", config).expect("build jira store");
        assert!(matches!(store, TicketStoreFactoryOutput::Jira(_)));
        assert_eq!(store.into_shared().kind(), TicketStoreKind::Jira);
    }

    #[test]
    fn build_store_reports_initialization_failures() {
        let error = build_store("tracker.jira", JiraConfig::default()).expect_err("blank url");
        assert!(matches!(error, TicketStoreError::StoreInitialization(_)));
    }
}
