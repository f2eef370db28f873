use std::cell::{Cell, RefCell};
use std::sync::Mutex;

use serde_json::json;

use tap_airtable::catalog::{Catalog, discover};
use tap_airtable::config::{TapConfig, TypeMerge};
use tap_airtable::observability::{NoopObserver, StreamContext, StreamStats, TapObserver, TapSeverity, Telemetry};
use tap_airtable::runner::{RunOutcome, TapMode, run};
use tap_airtable::source::{InMemorySource, RowPages, RowSource};
use tap_airtable::types::{Row, ScalarKind, SchemaNode};
use tap_airtable::{TapError, TapResult};

fn fixture_source() -> InMemorySource {
    InMemorySource::from_path("tests/fixtures/tasks.json").unwrap()
}

fn fixture_config() -> TapConfig {
    TapConfig::from_path("tests/fixtures/config.json").unwrap()
}

fn property<'a>(catalog: &'a Catalog, stream: &str, name: &str) -> Option<&'a SchemaNode> {
    catalog.get_stream(stream)?.schema.properties()?.get(name)
}

#[test]
fn tasks_scenario_produces_expected_schema() {
    let config = TapConfig::new("k", "app", vec!["Tasks".to_string()]);
    let catalog = discover(&config, &fixture_source(), Telemetry::new(&NoopObserver)).unwrap();

    assert_eq!(catalog.streams.len(), 1);
    let entry = &catalog.streams[0];
    assert_eq!(entry.tap_stream_id, "tasks");
    assert_eq!(entry.stream, "tasks");
    assert_eq!(entry.source_table(), "Tasks");
    assert_eq!(entry.key_properties, vec!["airtable_id".to_string()]);
    assert!(entry.is_selected());

    let names: Vec<&str> = entry.schema.properties().unwrap().names().collect();
    assert_eq!(names, vec!["airtable_id", "created_time", "task_name", "due_date"]);
    assert_eq!(
        property(&catalog, "tasks", "task_name"),
        Some(&SchemaNode::nullable(ScalarKind::String))
    );
    assert_eq!(
        property(&catalog, "tasks", "due_date"),
        Some(&SchemaNode::nullable(ScalarKind::String))
    );
}

#[test]
fn inventory_types_are_widened_across_rows() {
    let catalog = discover(&fixture_config(), &fixture_source(), Telemetry::new(&NoopObserver)).unwrap();

    assert_eq!(
        catalog.streams.iter().map(|e| e.tap_stream_id.as_str()).collect::<Vec<_>>(),
        vec!["tasks", "inventory"]
    );
    assert_eq!(
        property(&catalog, "inventory", "sku"),
        Some(&SchemaNode::nullable(ScalarKind::Integer))
    );
    assert_eq!(
        property(&catalog, "inventory", "price"),
        Some(&SchemaNode::nullable(ScalarKind::Number))
    );
    assert_eq!(
        property(&catalog, "inventory", "in_stock"),
        Some(&SchemaNode::nullable(ScalarKind::String))
    );
    assert_eq!(property(&catalog, "inventory", "notes"), Some(&SchemaNode::Any));
}

#[test]
fn last_wins_mode_keeps_the_final_observation() {
    let mut config = fixture_config();
    config.type_merge = TypeMerge::LastWins;
    let catalog = discover(&config, &fixture_source(), Telemetry::new(&NoopObserver)).unwrap();
    assert_eq!(
        property(&catalog, "inventory", "price"),
        Some(&SchemaNode::nullable(ScalarKind::Integer))
    );
}

#[test]
fn schema_properties_are_a_superset_of_observed_fields() {
    let rows = vec![
        Row::new("r1", None, json!({"Alpha One": 1}).as_object().cloned().unwrap()),
        Row::new("r2", None, json!({"Beta-Two": "x"}).as_object().cloned().unwrap()),
    ];
    let source = InMemorySource::new().with_table("T", rows);
    let config = TapConfig::new("k", "app", vec!["T".to_string()]);
    let catalog = discover(&config, &source, Telemetry::new(&NoopObserver)).unwrap();

    let props = catalog.streams[0].schema.properties().unwrap();
    for name in ["airtable_id", "created_time", "alpha_one", "betatwo"] {
        assert!(props.contains(name), "missing {name}");
    }
}

#[test]
fn duplicate_tables_collapse_into_one_entry() {
    let config = TapConfig::new(
        "k",
        "app",
        vec!["Tasks".to_string(), "Inventory".to_string(), "Tasks".to_string()],
    );
    let catalog = discover(&config, &fixture_source(), Telemetry::new(&NoopObserver)).unwrap();
    let ids: Vec<&str> = catalog.streams.iter().map(|e| e.tap_stream_id.as_str()).collect();
    assert_eq!(ids, vec!["tasks", "inventory"]);
}

#[test]
fn dumped_catalog_reloads_identically() {
    let catalog = discover(&fixture_config(), &fixture_source(), Telemetry::new(&NoopObserver)).unwrap();
    let mut out = Vec::new();
    catalog.dump(&mut out).unwrap();

    let text = String::from_utf8(out).unwrap();
    let raw: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(
        raw["streams"][0]["schema"]["properties"]["task_name"],
        json!({"type": ["null", "string"]})
    );
    assert_eq!(
        raw["streams"][0]["metadata"][0]["metadata"]["forced-replication-method"],
        json!("FULL_TABLE")
    );
    assert_eq!(Catalog::from_json_str(&text).unwrap(), catalog);
}

/// Source that answers `all` from memory and counts calls to `pages`.
struct CountingSource {
    inner: InMemorySource,
    pages_calls: Cell<usize>,
}

impl RowSource for CountingSource {
    fn all(&self, table: &str) -> TapResult<Vec<Row>> {
        self.inner.all(table)
    }

    fn pages<'a>(&'a self, table: &str, page_size: usize) -> TapResult<RowPages<'a>> {
        self.pages_calls.set(self.pages_calls.get() + 1);
        self.inner.pages(table, page_size)
    }
}

#[test]
fn discover_mode_prints_catalog_without_emitting_records() {
    let source = CountingSource {
        inner: fixture_source(),
        pages_calls: Cell::new(0),
    };
    let mut out = Vec::new();
    let outcome = run(
        &fixture_config(),
        TapMode::Discover,
        &source,
        &mut out,
        Telemetry::new(&NoopObserver),
    )
    .unwrap();

    assert!(matches!(outcome, RunOutcome::Discovered(ref c) if c.streams.len() == 2));
    assert_eq!(source.pages_calls.get(), 0);

    let text = String::from_utf8(out).unwrap();
    assert!(!text.contains("\"RECORD\""));
    let catalog = Catalog::from_json_str(&text).unwrap();
    assert_eq!(catalog.streams.len(), 2);
}

struct FailingSource;

impl RowSource for FailingSource {
    fn all(&self, _table: &str) -> TapResult<Vec<Row>> {
        Err(TapError::Api {
            status: 401,
            message: "AUTHENTICATION_REQUIRED".to_string(),
        })
    }

    fn pages<'a>(&'a self, _table: &str, _page_size: usize) -> TapResult<RowPages<'a>> {
        Ok(RowPages::new(std::iter::empty()))
    }
}

#[derive(Default)]
struct RecordingObserver {
    successes: Mutex<Vec<StreamStats>>,
    failures: Mutex<Vec<TapSeverity>>,
    alerts: Mutex<Vec<(String, TapSeverity)>>,
}

impl TapObserver for RecordingObserver {
    fn on_success(&self, _ctx: &StreamContext, stats: StreamStats) {
        self.successes.lock().unwrap().push(stats);
    }

    fn on_failure(&self, _ctx: &StreamContext, severity: TapSeverity, _error: &TapError) {
        self.failures.lock().unwrap().push(severity);
    }

    fn on_alert(&self, ctx: &StreamContext, severity: TapSeverity, _error: &TapError) {
        self.alerts.lock().unwrap().push((ctx.table.clone(), severity));
    }
}

#[test]
fn source_errors_propagate_and_alert() {
    let obs = RecordingObserver::default();
    let err = discover(&fixture_config(), &FailingSource, Telemetry::new(&obs)).unwrap_err();

    assert!(matches!(err, TapError::Api { status: 401, .. }));
    assert_eq!(*obs.failures.lock().unwrap(), vec![TapSeverity::Critical]);
    assert_eq!(
        *obs.alerts.lock().unwrap(),
        vec![("Tasks".to_string(), TapSeverity::Critical)]
    );
    assert!(obs.successes.lock().unwrap().is_empty());
}

#[test]
fn observer_sees_sample_stats() {
    let obs = RecordingObserver::default();
    discover(&fixture_config(), &fixture_source(), Telemetry::new(&obs)).unwrap();

    let successes = obs.successes.lock().unwrap().clone();
    assert_eq!(
        successes,
        vec![
            StreamStats { rows: 2, emitted: 4 },
            StreamStats { rows: 3, emitted: 6 },
        ]
    );
    assert!(obs.alerts.lock().unwrap().is_empty());
}

/// Source that records every table it is asked for.
struct RecordingSource {
    inner: InMemorySource,
    fetched: RefCell<Vec<String>>,
}

impl RowSource for RecordingSource {
    fn all(&self, table: &str) -> TapResult<Vec<Row>> {
        self.fetched.borrow_mut().push(table.to_string());
        self.inner.all(table)
    }

    fn pages<'a>(&'a self, table: &str, page_size: usize) -> TapResult<RowPages<'a>> {
        self.fetched.borrow_mut().push(table.to_string());
        self.inner.pages(table, page_size)
    }
}

#[test]
fn unnamable_table_is_rejected_before_fetching() {
    let config = TapConfig::new("k", "app", vec!["2024".to_string()]);
    let err = discover(&config, &FailingSource, Telemetry::new(&NoopObserver)).unwrap_err();
    assert!(matches!(err, TapError::Config { .. }));
}

#[test]
fn unnamable_table_late_in_the_list_fails_before_any_fetch() {
    let config = TapConfig::new("k", "app", vec!["Tasks".to_string(), "2024".to_string()]);
    let source = RecordingSource {
        inner: fixture_source(),
        fetched: RefCell::new(Vec::new()),
    };
    let obs = RecordingObserver::default();

    let err = discover(&config, &source, Telemetry::new(&obs)).unwrap_err();
    assert!(matches!(err, TapError::Config { .. }));
    assert!(source.fetched.borrow().is_empty());
    assert!(obs.successes.lock().unwrap().is_empty());
}
