pub mod factory;
pub mod interface;
pub mod providers;

pub use factory::{
    build_store, resolve_store_kind, supported_store_keys, TicketStoreFactoryOutput,
};
pub use interface::{
    CoreError, FieldUpdate, IssueTransition, RawIssue, SearchRequest, TicketKey, TicketStore,
    TicketStoreError, TicketStoreKind,
};
pub use providers::jira::{
    JiraConfig, JiraMethod, JiraRequest, JiraTicketStore, JiraTransport, ReqwestJiraTransport,
    RetryPolicy,
};
