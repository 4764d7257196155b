//! End-to-end tests: planning, execution, dry-run and revert against
//! in-memory and HTTP-backed destinations.

use fleetsync_engine::{
    AdaptiveRateLimiter, CancelToken, DestinationAdapter, DestinationCall, DryRunSwitch,
    EngineConfig, HttpDestination, HttpDestinationConfig, HttpMethod, HttpResponse,
    MemoryDestination, RateLimitConfig, RunOptions, Selection, SyncError, SyncExecutor, VerbGuard,
};
use fleetsync_model::{
    Classification, DestinationRecord, Endpoint, MatchMethod, RevertLog, SourceRecord,
    SyncAction, VerdictKind,
};
use fleetsync_testkit::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const BASE_URL: &str = "https://cmdb.test/api/v1";

fn two_record_scenario() -> (MemoryDestination, Vec<SourceRecord>) {
    let existing = laptop("1", "lt-001");
    let fresh = desktop("2", "pc-002");
    let dest = MemoryDestination::with_records(vec![drifted_copy("d-1", &existing)]);
    (dest, vec![existing, fresh])
}

#[test]
fn update_and_create_in_one_run() {
    let (dest, records) = two_record_scenario();
    let executor = memory_executor(&dest);

    let items = executor.plan(&records).unwrap();
    assert_eq!(items[0].action, SyncAction::Update);
    assert_eq!(items[0].matched.method, MatchMethod::Hostname);
    assert_eq!(
        items[0]
            .verdicts
            .iter()
            .filter(|v| v.kind == VerdictKind::Changed)
            .count(),
        1
    );
    assert_eq!(items[1].action, SyncAction::Create);

    let mut log = RevertLog::new();
    let result = executor
        .execute(&items, &RunOptions::new(), &CancelToken::new(), &mut log)
        .unwrap();

    assert_eq!(
        (result.created, result.updated, result.skipped, result.errors),
        (1, 1, 0, 0)
    );
    let entries = log.entries_for(&result.run_id);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "pc-002");
    assert_eq!(
        Some(entries[0].destination_id.as_str()),
        result.items[1].destination_id.as_deref()
    );
}

#[test]
fn selection_restricts_to_the_create() {
    let (dest, records) = two_record_scenario();
    let executor = memory_executor(&dest);
    let items = executor.plan(&records).unwrap();

    let options = RunOptions::new().with_selection(Selection::from_ids(["2"]));
    let result = executor
        .execute(&items, &options, &CancelToken::new(), &mut RevertLog::new())
        .unwrap();

    assert_eq!(
        (result.created, result.updated, result.skipped, result.errors),
        (1, 0, 1, 0)
    );
    assert_eq!(result.items[0].message.as_deref(), Some("not selected"));
}

#[test]
fn create_only_skips_updates() {
    let (dest, records) = two_record_scenario();
    let executor = memory_executor(&dest);
    let items = executor.plan(&records).unwrap();

    let options = RunOptions::new().with_create_only(true);
    let result = executor
        .execute(&items, &options, &CancelToken::new(), &mut RevertLog::new())
        .unwrap();

    assert_eq!(result.items[0].action, SyncAction::Skip);
    assert_eq!(result.updated, 0);
    assert_eq!(result.created, 1);
    assert!(!dest
        .calls()
        .iter()
        .any(|c| matches!(c, DestinationCall::Update { .. })));
}

#[test]
fn unknown_selection_ids_are_ignored() {
    let (dest, records) = two_record_scenario();
    let executor = memory_executor(&dest);
    let items = executor.plan(&records).unwrap();

    let options = RunOptions::new().with_selection(Selection::from_ids(["2", "nope"]));
    let result = executor
        .execute(&items, &options, &CancelToken::new(), &mut RevertLog::new())
        .unwrap();
    assert_eq!(result.created, 1);
    assert_eq!(result.skipped, 1);
}

#[test]
fn second_run_is_all_skips() {
    let dest = MemoryDestination::new();
    let executor = memory_executor(&dest);
    let fleet = sample_fleet();

    let first = executor.plan(&fleet).unwrap();
    executor
        .execute(&first, &RunOptions::new(), &CancelToken::new(), &mut RevertLog::new())
        .unwrap();
    let writes = dest.mutating_calls();

    let second = executor.plan(&fleet).unwrap();
    assert!(second.iter().all(|item| item.action == SyncAction::Skip));
    let result = executor
        .execute(&second, &RunOptions::new(), &CancelToken::new(), &mut RevertLog::new())
        .unwrap();
    assert_eq!(result.skipped, fleet.len());
    assert_eq!(dest.mutating_calls(), writes);
}

#[test]
fn hostname_beats_serial() {
    let record = laptop("1", "lt-001");
    let serial = record.serial_number.clone().unwrap();
    let snapshot = vec![
        DestinationRecord::new("by-serial", "other-host").with_serial(serial),
        DestinationRecord::new("by-name", "LT-001"),
    ];
    let items = fleetsync_engine::build_plan(&[record], &snapshot);
    assert_eq!(items[0].matched.destination_id.as_deref(), Some("by-name"));
    assert_eq!(items[0].matched.method, MatchMethod::Hostname);
}

#[test]
fn virtual_servers_never_match_by_serial() {
    let vm = SourceRecord::new("9", "vm-new")
        .with_kind("Server")
        .with_serial("R90XYZ12")
        .with_model("VMware Virtual Platform");
    let snapshot = vec![DestinationRecord::new("hw", "rack-01").with_serial("R90XYZ12")];

    let items = fleetsync_engine::build_plan(&[vm], &snapshot);
    assert_eq!(items[0].classification, Classification::VirtualServer);
    assert!(!items[0].matched.is_matched());
    assert_eq!(items[0].action, SyncAction::Create);
}

#[test]
fn physical_servers_match_by_serial() {
    let server = physical_server("4", "srv-renamed");
    let serial = server.serial_number.clone().unwrap();
    let snapshot = vec![DestinationRecord::new("hw", "srv-004").with_serial(serial)];

    let items = fleetsync_engine::build_plan(&[server], &snapshot);
    assert_eq!(items[0].matched.method, MatchMethod::Serial);
}

fn http_stack<'a>(client: &'a RecordingClient, switch: &DryRunSwitch) -> HttpExecutor<'a> {
    http_executor(BASE_URL, client, switch)
}

#[test]
fn dry_run_sends_no_mutating_request() {
    let fleet = sample_fleet();
    let client = RecordingClient::with_snapshot(vec![drifted_copy("d-1", &fleet[0])]);
    let switch = DryRunSwitch::new(false);
    let executor = http_stack(&client, &switch);

    let items = executor.plan(&fleet).unwrap();
    let mut log = RevertLog::new();
    let result = executor
        .execute(
            &items,
            &RunOptions::new().with_dry_run(true),
            &CancelToken::new(),
            &mut log,
        )
        .unwrap();

    assert_eq!(result.created, fleet.len() - 1);
    assert_eq!(result.updated, 1);
    assert_eq!(result.errors, 0);
    assert!(log.is_empty());
    assert!(client.mutating_requests().is_empty());
    assert!(result
        .created_ids()
        .all(|id| id.starts_with(fleetsync_engine::DRY_RUN_ID_PREFIX)));
}

#[test]
fn transport_guard_catches_writes_that_bypass_the_operation_guard() {
    let client = RecordingClient::new();
    let switch = DryRunSwitch::new(true);
    let http = HttpDestination::new(
        HttpDestinationConfig::new(BASE_URL),
        VerbGuard::new(&client, switch.clone()),
    );

    let attrs = fleetsync_engine::map_record(&laptop("1", "lt-001"), Classification::Laptop).fields;
    let err = http.create(Endpoint::Workstations, &attrs).unwrap_err();
    assert!(matches!(err, SyncError::DryRunBlocked { .. }));
    assert!(matches!(
        http.delete(Endpoint::Workstations, "1").unwrap_err(),
        SyncError::DryRunBlocked { .. }
    ));

    assert!(http.list().unwrap().is_empty());
    assert_eq!(client.requests().len(), 1);
    assert!(client.mutating_requests().is_empty());
}

#[test]
fn live_run_over_http_then_revert() {
    let fleet = sample_fleet();
    let client = RecordingClient::with_snapshot(vec![drifted_copy("d-1", &fleet[0])]);
    let switch = DryRunSwitch::new(false);
    let executor = http_stack(&client, &switch);

    let items = executor.plan(&fleet).unwrap();
    let mut log = RevertLog::new();
    let result = executor
        .execute(&items, &RunOptions::new(), &CancelToken::new(), &mut log)
        .unwrap();
    assert_eq!(result.created, fleet.len() - 1);
    assert_eq!(client.requests_with(HttpMethod::Put).len(), 1);

    let created: HashSet<String> = result.created_ids().map(str::to_string).collect();
    let report = executor.revert(&result.run_id, &mut log, false).unwrap();

    let deletes = client.requests_with(HttpMethod::Delete);
    assert_eq!(deletes.len(), created.len());
    let deleted: HashSet<String> = report.deleted.iter().cloned().collect();
    assert_eq!(deleted, created);
    assert!(deletes.iter().all(|r| !r.url.ends_with("/d-1")));
    assert!(log.entries_for(&result.run_id).is_empty());
}

#[test]
fn revert_dry_run_keeps_log_and_sends_nothing() {
    let dest = MemoryDestination::new();
    let executor = memory_executor(&dest);
    let items = executor.plan(&sample_fleet()).unwrap();
    let mut log = RevertLog::new();
    let result = executor
        .execute(&items, &RunOptions::new(), &CancelToken::new(), &mut log)
        .unwrap();
    let writes = dest.mutating_calls();

    let report = executor.revert(&result.run_id, &mut log, true).unwrap();
    assert!(report.dry_run);
    assert_eq!(report.deleted.len(), result.created);
    assert_eq!(log.entries_for(&result.run_id).len(), result.created);
    assert_eq!(dest.mutating_calls(), writes);
}

#[test]
fn authentication_failure_stops_before_any_item() {
    let client = RecordingClient::new();
    client.push_response(HttpResponse::empty(401));
    let switch = DryRunSwitch::new(false);
    let executor = http_stack(&client, &switch);

    let err = executor.plan(&sample_fleet()).unwrap_err();
    assert!(err.is_fatal());
    assert!(client.mutating_requests().is_empty());
}

#[test]
fn throttled_create_waits_and_retries() {
    let client = RecordingClient::new();
    let limits = RateLimitConfig::new(Duration::ZERO, Duration::ZERO, Duration::from_millis(20));
    let limiter = Arc::new(AdaptiveRateLimiter::new("cmdb", limits));
    let executor = SyncExecutor::http_with_limiter(
        HttpDestinationConfig::new(BASE_URL),
        &client,
        Arc::clone(&limiter),
        DryRunSwitch::new(false),
        EngineConfig::new().with_max_throttle_retries(3),
    );

    let items = executor.plan(&[laptop("1", "lt-001")]).unwrap();
    client.push_response(HttpResponse::empty(429).with_retry_after(Duration::from_secs(30)));

    let result = executor
        .execute(&items, &RunOptions::new(), &CancelToken::new(), &mut RevertLog::new())
        .unwrap();

    assert_eq!(result.created, 1);
    assert_eq!(client.requests_with(HttpMethod::Post).len(), 2);
    let stats = limiter.stats();
    assert_eq!(stats.throttled, 1);
    assert!(stats.current_interval <= Duration::from_millis(20));
}

#[test]
fn rejected_fields_are_stripped_and_resent() {
    let client = RecordingClient::new();
    let switch = DryRunSwitch::new(false);
    let executor = http_stack(&client, &switch);
    let items = executor.plan(&[laptop("1", "lt-001")]).unwrap();

    client.push_response(HttpResponse::json(
        422,
        &serde_json::json!({
            "message": "unknown attributes",
            "errors": [{"code": "EXTRA_KEY", "field": "processors"}]
        }),
    ));
    let result = executor
        .execute(&items, &RunOptions::new(), &CancelToken::new(), &mut RevertLog::new())
        .unwrap();
    assert_eq!(result.created, 1);

    let posts = client.requests_with(HttpMethod::Post);
    assert_eq!(posts.len(), 2);
    let body = |i: usize| posts[i].body.clone().unwrap_or_default();
    assert!(body(0)["asset_workstation"].get("processors").is_some());
    assert!(body(1)["asset_workstation"].get("processors").is_none());
}

#[test]
fn validation_failure_is_recorded_per_item() {
    let client = RecordingClient::new();
    let switch = DryRunSwitch::new(false);
    let executor = http_stack(&client, &switch);
    let items = executor
        .plan(&[laptop("1", "lt-001"), desktop("2", "pc-002")])
        .unwrap();

    client.push_response(HttpResponse::json(
        400,
        &serde_json::json!({"message": "name already taken"}),
    ));
    let mut log = RevertLog::new();
    let result = executor
        .execute(&items, &RunOptions::new(), &CancelToken::new(), &mut log)
        .unwrap();

    assert_eq!(result.errors, 1);
    assert_eq!(result.created, 1);
    assert_eq!(
        result.items[0].message.as_deref(),
        Some("validation failed: name already taken")
    );
    assert_eq!(log.len(), 1);
}

#[test]
fn cancellation_between_items_returns_partial_result() {
    let dest = MemoryDestination::new();
    let executor = memory_executor(&dest);
    let items = executor.plan(&sample_fleet()).unwrap();
    let cancel = CancelToken::new();

    // Cancel from inside the run: the second create trips the token.
    struct Cancelling<'a> {
        inner: &'a MemoryDestination,
        cancel: CancelToken,
    }
    impl DestinationAdapter for Cancelling<'_> {
        fn create(
            &self,
            endpoint: Endpoint,
            attrs: &fleetsync_model::Attributes,
        ) -> fleetsync_engine::EngineResult<String> {
            let id = self.inner.create(endpoint, attrs)?;
            if self.inner.mutating_calls() == 2 {
                self.cancel.cancel();
            }
            Ok(id)
        }
        fn update(
            &self,
            endpoint: Option<Endpoint>,
            id: &str,
            attrs: &fleetsync_model::Attributes,
        ) -> fleetsync_engine::EngineResult<()> {
            self.inner.update(endpoint, id, attrs)
        }
        fn delete(&self, endpoint: Endpoint, id: &str) -> fleetsync_engine::EngineResult<()> {
            self.inner.delete(endpoint, id)
        }
        fn list(&self) -> fleetsync_engine::EngineResult<Vec<DestinationRecord>> {
            self.inner.list()
        }
    }

    let cancelling = SyncExecutor::with_config(
        Cancelling {
            inner: &dest,
            cancel: cancel.clone(),
        },
        DryRunSwitch::new(false),
        unthrottled_config(),
    );
    let mut log = RevertLog::new();
    let result = cancelling
        .execute(&items, &RunOptions::new(), &cancel, &mut log)
        .unwrap();

    assert!(result.cancelled);
    assert_eq!(result.total_items, 2);
    assert_eq!(log.len(), 2);
}

fn paced_limiter(interval: Duration) -> Arc<AdaptiveRateLimiter> {
    Arc::new(AdaptiveRateLimiter::new(
        "cmdb",
        RateLimitConfig::new(interval, interval, Duration::from_secs(1)),
    ))
}

#[test]
fn every_snapshot_page_waits_for_the_limiter() {
    let interval = Duration::from_millis(100);
    let snapshot: Vec<DestinationRecord> = (1..=5)
        .map(|i| DestinationRecord::new(format!("d-{i}"), format!("host-{i}")))
        .collect();
    let client = RecordingClient::with_snapshot(snapshot);
    let limiter = paced_limiter(interval);
    let executor = SyncExecutor::http_with_limiter(
        HttpDestinationConfig::new(BASE_URL).with_page_size(2),
        &client,
        Arc::clone(&limiter),
        DryRunSwitch::new(false),
        unthrottled_config(),
    );

    assert_eq!(executor.fetch_snapshot().unwrap().len(), 5);
    assert_eq!(client.requests_with(HttpMethod::Get).len(), 3);
    assert_eq!(executor.limiter_stats().total_calls, 3);
    let gaps = client.request_gaps();
    assert!(gaps.iter().all(|gap| *gap >= interval), "{gaps:?}");
}

#[test]
fn field_resends_wait_for_the_limiter() {
    let interval = Duration::from_millis(100);
    let client = RecordingClient::new();
    let limiter = paced_limiter(interval);
    let executor = SyncExecutor::http_with_limiter(
        HttpDestinationConfig::new(BASE_URL),
        &client,
        Arc::clone(&limiter),
        DryRunSwitch::new(false),
        unthrottled_config(),
    );
    let items = executor.plan(&[laptop("1", "lt-001")]).unwrap();

    client.push_response(HttpResponse::json(
        422,
        &serde_json::json!({"errors": [{"code": "EXTRA_KEY", "field": "processors"}]}),
    ));
    let result = executor
        .execute(&items, &RunOptions::new(), &CancelToken::new(), &mut RevertLog::new())
        .unwrap();
    assert_eq!(result.created, 1);

    // snapshot page, rejected create, re-sent create
    assert_eq!(limiter.stats().total_calls, 3);
    let gaps = client.request_gaps();
    assert_eq!(gaps.len(), 2);
    assert!(gaps.iter().all(|gap| *gap >= interval), "{gaps:?}");
}

#[test]
fn throttled_page_is_retried_without_refetching_earlier_pages() {
    let snapshot = vec![
        DestinationRecord::new("d-3", "host-3"),
        DestinationRecord::new("d-4", "host-4"),
        DestinationRecord::new("d-5", "host-5"),
    ];
    let client = RecordingClient::with_snapshot(snapshot);
    client.push_response(HttpResponse::json(
        200,
        &serde_json::json!({
            "assets": [{"id": "d-1", "name": "host-1"}, {"id": "d-2", "name": "host-2"}],
            "has_more": true
        }),
    ));
    client.push_response(HttpResponse::empty(429));
    let executor = SyncExecutor::http(
        HttpDestinationConfig::new(BASE_URL).with_page_size(2),
        &client,
        DryRunSwitch::new(false),
        unthrottled_config(),
    );

    let records = executor.fetch_snapshot().unwrap();
    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["d-1", "d-2", "d-5"]);

    let urls: Vec<String> = client.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(urls.len(), 3);
    assert!(urls[0].contains("page=1&"));
    assert!(urls[1].contains("page=2&"));
    assert!(urls[2].contains("page=2&"));
    assert_eq!(executor.limiter_stats().throttled, 1);
}

#[test]
fn reclassified_device_is_updated_where_it_lives() {
    let client = RecordingClient::with_snapshot(vec![
        DestinationRecord::new("9", "srv-01").with_endpoint(Endpoint::Servers),
    ]);
    let switch = DryRunSwitch::new(false);
    let executor = http_stack(&client, &switch);
    let vm = SourceRecord::new("1", "srv-01")
        .with_kind("Server")
        .with_serial("VMware-42 1a 2b")
        .with_model("VMware Virtual Platform");

    let items = executor.plan(&[vm]).unwrap();
    assert_eq!(items[0].classification, Classification::VirtualServer);
    assert_eq!(items[0].action, SyncAction::Update);

    let result = executor
        .execute(&items, &RunOptions::new(), &CancelToken::new(), &mut RevertLog::new())
        .unwrap();
    assert_eq!(result.updated, 1);

    let puts = client.requests_with(HttpMethod::Put);
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].url, format!("{BASE_URL}/asset_servers/9"));
    assert!(puts[0].body.as_ref().unwrap().get("asset_server").is_some());
}

#[test]
fn update_of_record_without_collection_uses_generic_route() {
    let existing = laptop("1", "lt-001");
    let mut drifted = drifted_copy("d-1", &existing);
    drifted.endpoint = None;
    let client = RecordingClient::with_snapshot(vec![drifted]);
    let switch = DryRunSwitch::new(false);
    let executor = http_stack(&client, &switch);

    let items = executor.plan(&[existing]).unwrap();
    assert_eq!(items[0].action, SyncAction::Update);
    executor
        .execute(&items, &RunOptions::new(), &CancelToken::new(), &mut RevertLog::new())
        .unwrap();

    let puts = client.requests_with(HttpMethod::Put);
    assert_eq!(puts[0].url, format!("{BASE_URL}/assets/d-1"));
    assert!(puts[0].body.as_ref().unwrap().get("asset").is_some());
}
