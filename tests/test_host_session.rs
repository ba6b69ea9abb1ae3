use async_trait::async_trait;
use sql_pager::data::{DataColumn, DataRow, DataTable, DataType, DataValue};
use sql_pager::engine::{Engine, EngineError, MemoryEngine, Row, Schema};
use sql_pager::protocol::{DisplayMessage, HostMessage};
use sql_pager::services::{channel_pair, HostSession};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

/// Holds back every `run` whose SQL contains `marker` until released
struct GatedEngine {
    inner: MemoryEngine,
    marker: &'static str,
    gate: Notify,
}

impl GatedEngine {
    fn new(rows: i64, marker: &'static str) -> Arc<Self> {
        let mut table = DataTable::new("data");
        table.add_column(DataColumn::new("n").with_type(DataType::Integer));
        for i in 0..rows {
            table.add_row(DataRow::new(vec![DataValue::Integer(i)])).unwrap();
        }
        let mut inner = MemoryEngine::new();
        inner.register_table("data", table);
        Arc::new(Self {
            inner,
            marker,
            gate: Notify::new(),
        })
    }

    fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl Engine for GatedEngine {
    async fn describe(&self, query: &str) -> Result<Schema, EngineError> {
        self.inner.describe(query).await
    }

    async fn run(&self, query: &str) -> Result<Vec<Row>, EngineError> {
        if query.contains(self.marker) {
            self.gate.notified().await;
        }
        self.inner.run(query).await
    }
}

fn query(sql: &str, limit: usize) -> DisplayMessage {
    DisplayMessage::Query {
        sql: sql.to_string(),
        limit,
    }
}

fn more(sql: &str, limit: usize, offset: usize) -> DisplayMessage {
    DisplayMessage::More {
        sql: sql.to_string(),
        limit,
        offset,
    }
}

fn row_count(message: &HostMessage) -> usize {
    match message {
        HostMessage::Query { results, .. } | HostMessage::More { results, .. } => {
            results.as_ref().map(Vec::len).unwrap_or(0)
        }
    }
}

#[tokio::test]
async fn test_reply_in_flight_survives_display_close() {
    let engine = GatedEngine::new(10, "FROM data");
    let (display_tx, display_rx) = mpsc::channel(4);
    let (host_tx, mut host_rx) = mpsc::channel(4);
    let session = tokio::spawn(HostSession::new(Arc::clone(&engine), 100).run(display_rx, host_tx));

    display_tx.send(query("SELECT * FROM data", 5)).await.unwrap();
    drop(display_tx);
    engine.release();

    let reply = host_rx.recv().await.unwrap();
    assert!(matches!(reply, HostMessage::Query { success: true, .. }));
    assert_eq!(row_count(&reply), 5);

    assert!(host_rx.recv().await.is_none());
    session.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_superseded_query_is_never_delivered() {
    let engine = GatedEngine::new(10, "n >= 0");
    let (host, mut display) = channel_pair(4);
    let session = HostSession::new(Arc::clone(&engine), 100).spawn(host);

    display
        .send(query("SELECT * FROM data WHERE n >= 0", 100))
        .await
        .unwrap();
    display
        .send(query("SELECT * FROM data WHERE n < 2", 100))
        .await
        .unwrap();

    let reply = display.recv().await.unwrap();
    assert_eq!(row_count(&reply), 2);

    // The first query finishes only now, under a superseded token
    engine.release();
    drop(display);
    session.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_more_for_another_query_is_ignored() {
    let engine = GatedEngine::new(25, "no such marker");
    let (host, mut display) = channel_pair(4);
    let session = HostSession::new(engine, 10).spawn(host);
    let sql = "SELECT * FROM data";

    display.send(query(sql, 10)).await.unwrap();
    assert_eq!(row_count(&display.recv().await.unwrap()), 10);

    display.send(more("SELECT n FROM data", 10, 10)).await.unwrap();
    // The offset is advisory; the cursor decides where the page starts
    display.send(more(sql, 10, 999)).await.unwrap();

    let reply = display.recv().await.unwrap();
    assert!(matches!(reply, HostMessage::More { success: true, .. }));
    assert_eq!(row_count(&reply), 10);
    if let HostMessage::More {
        results: Some(rows),
        ..
    } = &reply
    {
        assert_eq!(rows[0]["n"], 10);
    }

    drop(display);
    session.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_engine_errors_reach_the_display() {
    let engine = GatedEngine::new(3, "no such marker");
    let (host, mut display) = channel_pair(4);
    let session = HostSession::new(engine, 10).spawn(host);

    display
        .send(query("SELECT * FROM missing", 10))
        .await
        .unwrap();
    assert_eq!(
        display.recv().await.unwrap(),
        HostMessage::query_error("table with name missing does not exist")
    );

    display.send(query("SELECT px FROM data", 10)).await.unwrap();
    assert_eq!(
        display.recv().await.unwrap(),
        HostMessage::query_error("column px not found")
    );

    drop(display);
    session.await.unwrap().unwrap();
}
