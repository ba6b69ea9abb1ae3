use async_trait::async_trait;
use serde_json::json;
use sql_pager::data::{DataColumn, DataRow, DataTable, DataType, DataValue};
use sql_pager::engine::{Engine, EngineError, MemoryEngine, Row, Schema};
use sql_pager::protocol::HostMessage;
use sql_pager::query::{wrap, CoordinatorEvent, EngineCall, LoadState, QueryCoordinator};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Wraps an engine and records every call made against it
struct CountingEngine {
    inner: MemoryEngine,
    describes: AtomicUsize,
    runs: AtomicUsize,
    run_sql: Mutex<Vec<String>>,
}

impl CountingEngine {
    fn new(inner: MemoryEngine) -> Self {
        Self {
            inner,
            describes: AtomicUsize::new(0),
            runs: AtomicUsize::new(0),
            run_sql: Mutex::new(Vec::new()),
        }
    }

    fn describes(&self) -> usize {
        self.describes.load(Ordering::SeqCst)
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Engine for CountingEngine {
    async fn describe(&self, query: &str) -> Result<Schema, EngineError> {
        self.describes.fetch_add(1, Ordering::SeqCst);
        self.inner.describe(query).await
    }

    async fn run(&self, query: &str) -> Result<Vec<Row>, EngineError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.run_sql.lock().unwrap().push(query.to_string());
        self.inner.run(query).await
    }
}

fn numbers(count: i64) -> MemoryEngine {
    let mut table = DataTable::new("numbers");
    table.add_column(DataColumn::new("n").with_type(DataType::Integer));
    table.add_column(DataColumn::new("label").with_type(DataType::String));
    for i in 0..count {
        table
            .add_row(DataRow::new(vec![
                DataValue::Integer(i),
                DataValue::String(format!("row {}", i)),
            ]))
            .unwrap();
    }
    let mut engine = MemoryEngine::new();
    engine.register_table("numbers", table);
    engine
}

async fn complete(
    coordinator: &mut QueryCoordinator,
    call: EngineCall,
    engine: &CountingEngine,
) -> Option<CoordinatorEvent> {
    let reply = call.execute(engine).await;
    coordinator.on_reply(reply)
}

#[tokio::test]
async fn test_first_page_is_bounded_by_page_size() {
    for (rows, page_size, expected) in [(250, 100, 100), (30, 100, 30), (0, 10, 0)] {
        let engine = numbers(rows);
        let result = engine
            .query(&wrap("SELECT * FROM numbers", page_size, 0))
            .unwrap();
        assert_eq!(result.row_count(), expected);
    }
}

#[tokio::test]
async fn test_pages_walk_to_exhaustion() {
    let engine = CountingEngine::new(numbers(250));
    let mut coordinator = QueryCoordinator::new(100);

    let call = coordinator.submit("SELECT * FROM numbers").unwrap();
    assert_eq!(call.page().offset, 0);
    match complete(&mut coordinator, call, &engine).await {
        Some(CoordinatorEvent::QueryReady {
            schema,
            rows,
            exhausted,
        }) => {
            assert_eq!(schema.names(), vec!["n", "label"]);
            assert_eq!(rows.len(), 100);
            assert_eq!(rows[0]["n"], json!(0));
            assert!(!exhausted);
        }
        other => panic!("expected first page, got {:?}", other),
    }

    let mut page_sizes = Vec::new();
    let mut offsets = Vec::new();
    while let Some(call) = coordinator.load_more() {
        offsets.push(call.page().offset);
        match complete(&mut coordinator, call, &engine).await {
            Some(CoordinatorEvent::PageAppended { rows, exhausted }) => {
                page_sizes.push(rows.len());
                assert_eq!(exhausted, rows.len() < 100);
            }
            other => panic!("expected a page, got {:?}", other),
        }
    }

    assert_eq!(offsets, vec![100, 200]);
    assert_eq!(page_sizes, vec![100, 50]);
    assert!(coordinator.cursor().is_exhausted());
    // The cursor moves a full page even when the page came back short
    assert_eq!(coordinator.cursor().offset(), 300);

    let runs = engine.runs();
    assert!(coordinator.load_more().is_none());
    assert_eq!(engine.runs(), runs);

    let run_sql = engine.run_sql.lock().unwrap();
    assert!(run_sql[0].ends_with("LIMIT 100 OFFSET 0"));
    assert!(run_sql[1].ends_with("LIMIT 100 OFFSET 100"));
    assert!(run_sql[2].ends_with("LIMIT 100 OFFSET 200"));
}

#[tokio::test]
async fn test_load_more_needs_idle_cursor() {
    let engine = CountingEngine::new(numbers(250));
    let mut coordinator = QueryCoordinator::new(100);

    // Nothing submitted yet
    assert!(coordinator.load_more().is_none());

    let call = coordinator.submit("SELECT * FROM numbers").unwrap();
    assert_eq!(coordinator.state(), LoadState::LoadingFresh);
    assert!(coordinator.load_more().is_none());
    complete(&mut coordinator, call, &engine).await;

    let more = coordinator.load_more().unwrap();
    assert_eq!(coordinator.state(), LoadState::LoadingMore);
    assert!(coordinator.load_more().is_none());
    complete(&mut coordinator, more, &engine).await;
    assert_eq!(coordinator.state(), LoadState::Idle);

    // One describe and two runs in total
    assert_eq!(engine.describes(), 1);
    assert_eq!(engine.runs(), 2);
}

#[tokio::test]
async fn test_stale_more_reply_is_discarded() {
    let engine = CountingEngine::new(numbers(250));
    let mut coordinator = QueryCoordinator::new(100);

    let first = coordinator.submit("SELECT * FROM numbers").unwrap();
    complete(&mut coordinator, first, &engine).await;
    let stale_more = coordinator.load_more().unwrap();

    let fresh = coordinator
        .submit("SELECT n FROM numbers WHERE n < 5")
        .unwrap();

    // The new submission resolves first, the old page afterwards
    match complete(&mut coordinator, fresh, &engine).await {
        Some(CoordinatorEvent::QueryReady {
            rows, exhausted, ..
        }) => {
            assert_eq!(rows.len(), 5);
            assert!(exhausted);
        }
        other => panic!("expected fresh results, got {:?}", other),
    }
    assert!(complete(&mut coordinator, stale_more, &engine).await.is_none());

    assert_eq!(coordinator.state(), LoadState::Idle);
    assert_eq!(coordinator.cursor().offset(), 100);
    assert_eq!(coordinator.cursor().query(), "SELECT n FROM numbers WHERE n < 5");
}

#[tokio::test]
async fn test_describe_error_becomes_bare_query_failure() {
    let engine = CountingEngine::new(numbers(10));
    let mut coordinator = QueryCoordinator::new(100);

    let call = coordinator.submit("SELECT * FROM").unwrap();
    let event = complete(&mut coordinator, call, &engine).await.unwrap();
    assert_eq!(coordinator.state(), LoadState::Errored);
    assert_eq!(engine.runs(), 0);

    let message = HostMessage::from(event);
    let encoded = serde_json::to_value(&message).unwrap();
    let object = encoded.as_object().unwrap();
    assert_eq!(object.len(), 3);
    assert_eq!(object["type"], json!("query"));
    assert_eq!(object["success"], json!(false));
    assert!(object["message"]
        .as_str()
        .unwrap()
        .starts_with("syntax error near"));
}

#[tokio::test]
async fn test_duplicate_submit_issues_one_call_pair() {
    let engine = CountingEngine::new(numbers(10));
    let mut coordinator = QueryCoordinator::new(100);

    let call = coordinator.submit("SELECT * FROM numbers").unwrap();
    assert!(coordinator.submit("SELECT * FROM numbers").is_none());
    complete(&mut coordinator, call, &engine).await;

    assert_eq!(engine.describes(), 1);
    assert_eq!(engine.runs(), 1);

    // After the reply the same text is a new submission
    assert!(coordinator.submit("SELECT * FROM numbers").is_some());
}

#[tokio::test]
async fn test_first_semicolon_is_stripped_before_wrapping() {
    let engine = CountingEngine::new(numbers(3));
    let mut coordinator = QueryCoordinator::new(100);

    let call = coordinator.submit("SELECT * FROM numbers;").unwrap();
    match complete(&mut coordinator, call, &engine).await {
        Some(CoordinatorEvent::QueryReady { rows, .. }) => assert_eq!(rows.len(), 3),
        other => panic!("expected results, got {:?}", other),
    }

    // A ';' inside a literal is the one removed, so the trailing one survives
    let wrapped = wrap("SELECT * FROM numbers WHERE label = 'a;b';", 10, 0);
    assert!(wrapped.contains("'ab';"));
}
