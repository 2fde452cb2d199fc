use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fieldops_domain::{
    group_by_date_bucket, AgingThresholds, CoreError, TicketKey, UNDATED_LABEL,
};
use fieldops_engine::{
    build_store_digests, BatchDispatcher, DispatchOptions, FieldMap, NormalizationError,
    Normalizer, RescheduleOutcome, RescheduleRequest, ResolutionMode, TicketEngine,
};
use fieldops_ticketing::{JiraConfig, JiraRequest, JiraTicketStore, JiraTransport, TicketStore};
use serde_json::{json, Value};
use time::macros::{date, datetime, offset};

#[derive(Default)]
struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<Value, CoreError>>>,
    requests: Mutex<Vec<JiraRequest>>,
}

impl ScriptedTransport {
    fn scripted(responses: Vec<Result<Value, CoreError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<JiraRequest> {
        self.requests.lock().expect("lock requests").clone()
    }
}

#[async_trait]
impl JiraTransport for ScriptedTransport {
    async fn execute(&self, request: JiraRequest) -> Result<Value, CoreError> {
        self.requests.lock().expect("lock requests").push(request);
        self.responses
            .lock()
            .expect("lock responses")
            .pop_front()
            .unwrap_or(Err(CoreError::DependencyUnavailable("exhausted".to_owned())))
    }
}

fn store(transport: Arc<ScriptedTransport>, fetch_limit: u32) -> Arc<dyn TicketStore> {
    let config = JiraConfig {
        base_url: "https://tracker.example.com".to_owned(),
        fetch_limit,
        ..JiraConfig::default()
    };
    Arc::new(JiraTicketStore::with_transport(config, transport))
}

fn engine_with_page_size(transport: Arc<ScriptedTransport>, fetch_limit: u32) -> TicketEngine {
    TicketEngine::new(
        store(transport, fetch_limit),
        Normalizer::new(FieldMap::default(), offset!(-3)),
    )
}

fn engine(transport: Arc<ScriptedTransport>) -> TicketEngine {
    engine_with_page_size(transport, 100)
}

fn issue(key: &str, store_id: &str, scheduled: Option<&str>) -> Value {
    json!({
        "key": key,
        "fields": {
            "status": { "name": "Open" },
            "created": "2026-03-01T09:00:00.000-0300",
            "customfield_10100": store_id,
            "customfield_10102": "05",
            "customfield_10103": { "value": "Printer", "id": "10001" },
            "customfield_10109": scheduled
        }
    })
}

#[tokio::test]
async fn merged_queries_keep_one_copy_and_report_dropped_records() {
    let transport = ScriptedTransport::scripted(vec![
        Ok(json!({
            "issues": [
                issue("FS-1", "0042", Some("2026-03-05")),
                { "fields": { "summary": "no key" } },
                issue("FS-2", "0042", None)
            ],
            "total": 3
        })),
        Ok(json!({
            "issues": [
                issue("FS-1", "0042", Some("2026-03-05")),
                issue("FS-3", "0007", Some("2026-03-04"))
            ],
            "total": 2
        })),
    ]);
    let engine = engine(transport.clone());

    let outcome = engine
        .fetch_many(&["status = Open", "assignee = currentUser()"])
        .await
        .expect("fetch");
    let keys: Vec<&str> = outcome
        .tickets
        .iter()
        .map(|ticket| ticket.key.as_str())
        .collect();
    assert_eq!(keys, vec!["FS-1", "FS-2", "FS-3"]);
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].query, "status = Open");
    assert_eq!(outcome.rejected[0].position, 1);

    let requested = transport.requests()[0].body.clone().expect("search body");
    assert_eq!(requested["jql"], json!("status = Open"));
    assert!(requested["fields"]
        .as_array()
        .expect("fields")
        .contains(&json!("customfield_10109")));

    let buckets = group_by_date_bucket(&outcome.tickets, offset!(-3));
    let labels: Vec<&str> = buckets.iter().map(|bucket| bucket.label.as_str()).collect();
    assert_eq!(labels, vec!["04/03/2026", "05/03/2026", UNDATED_LABEL]);

    let digests = build_store_digests(
        &outcome.tickets,
        AgingThresholds::new(3, 7),
        AgingThresholds::default(),
        datetime!(2026-03-12 12:00 -3),
    );
    assert_eq!(digests.len(), 2);
    assert_eq!(digests[0].store_id, "0007");
    assert_eq!(digests[1].duplicate_signatures.len(), 1);
    assert_eq!(digests[1].counts.critical, 2);
}

#[tokio::test]
async fn failed_search_is_an_error_not_an_empty_result() {
    let transport = ScriptedTransport::scripted(vec![
        Ok(json!({ "issues": [], "total": 0 })),
        Err(CoreError::Unauthorized("HTTP 401".to_owned())),
    ]);
    let engine = engine(transport);

    let empty = engine
        .fetch_and_normalize("status = Closed")
        .await
        .expect("empty result is fine");
    assert!(empty.tickets.is_empty());

    let error = engine
        .fetch_and_normalize("status = Open")
        .await
        .expect_err("unauthorized search");
    assert_eq!(error.query, "status = Open");
    assert!(matches!(error.source, CoreError::Unauthorized(_)));
}

#[tokio::test]
async fn reschedule_uses_current_schedule_for_conflicts() {
    let transport = ScriptedTransport::scripted(vec![
        Ok(json!({
            "issues": [
                issue("FS-1", "0042", Some("2026-03-02")),
                issue("FS-2", "0042", None)
            ]
        })),
        Ok(Value::Null),
    ]);
    let engine = engine(transport.clone());
    let keys = vec![TicketKey::from("FS-1"), TicketKey::from("FS-2")];

    let current = engine.current_schedule(&keys).await.expect("schedule");
    assert_eq!(current.len(), 1);
    assert_eq!(current[&TicketKey::from("FS-1")], date!(2026 - 03 - 02));

    let dispatcher = BatchDispatcher::new(engine.store(), DispatchOptions::default());
    let request = RescheduleRequest::new(keys, date!(2026 - 03 - 05)).with_current_dates(current);
    let outcome = dispatcher
        .batch_reschedule(&request, Some(ResolutionMode::SkipConflicting))
        .await
        .expect("reschedule");

    let RescheduleOutcome::Applied { result, skipped, .. } = outcome else {
        panic!("expected applied outcome");
    };
    assert_eq!(result.succeeded, 1);
    assert_eq!(skipped, vec![TicketKey::from("FS-1")]);

    let requests = transport.requests();
    assert_eq!(
        requests[0].body.as_ref().expect("search body")["jql"],
        json!("key in (FS-1, FS-2)")
    );
    assert_eq!(requests[1].path, "rest/api/2/issue/FS-2");
    assert_eq!(
        requests[1].body,
        Some(json!({ "fields": { "customfield_10109": "2026-03-05" } }))
    );
}

#[tokio::test]
async fn malformed_record_is_rejected_without_losing_the_page() {
    let transport = ScriptedTransport::scripted(vec![Ok(json!({
        "issues": [
            issue("FS-1", "0042", None),
            { "key": 12345, "fields": {} },
            issue("FS-3", "0042", None)
        ],
        "total": 3
    }))]);
    let engine = engine(transport);

    let outcome = engine
        .fetch_and_normalize("project = FS")
        .await
        .expect("malformed record does not fail the search");
    let keys: Vec<&str> = outcome
        .tickets
        .iter()
        .map(|ticket| ticket.key.as_str())
        .collect();
    assert_eq!(keys, vec!["FS-1", "FS-3"]);
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].position, 1);
    assert_eq!(outcome.rejected[0].error, NormalizationError::MissingKey);
}

#[tokio::test]
async fn current_schedule_looks_up_keys_beyond_one_page() {
    let transport = ScriptedTransport::scripted(vec![
        Ok(json!({
            "issues": [
                issue("FS-1", "0042", Some("2026-03-02")),
                issue("FS-2", "0042", None)
            ]
        })),
        Ok(json!({
            "issues": [issue("FS-3", "0042", None), issue("FS-4", "0042", None)]
        })),
        Ok(json!({ "issues": [issue("FS-5", "0007", Some("2026-03-04"))] })),
    ]);
    let engine = engine_with_page_size(transport.clone(), 2);
    let keys: Vec<TicketKey> = (1..=5).map(|n| TicketKey::from(format!("FS-{n}"))).collect();

    let current = engine.current_schedule(&keys).await.expect("schedule");
    assert_eq!(current.len(), 2);
    assert_eq!(current[&TicketKey::from("FS-1")], date!(2026 - 03 - 02));
    assert_eq!(current[&TicketKey::from("FS-5")], date!(2026 - 03 - 04));

    let bodies: Vec<Value> = transport
        .requests()
        .into_iter()
        .map(|request| request.body.expect("search body"))
        .collect();
    assert_eq!(bodies.len(), 3);
    assert_eq!(bodies[0]["jql"], json!("key in (FS-1, FS-2)"));
    assert_eq!(bodies[2]["jql"], json!("key in (FS-5)"));
    assert_eq!(bodies[2]["maxResults"], json!(1));
}
