use sql_pager::data::{DataColumn, DataRow, DataTable, DataType, DataValue};
use sql_pager::display::{CellFormats, ColumnSpec, DisplayHint, DisplaySync, Renderer, Viewport};
use sql_pager::engine::{MemoryEngine, Row};
use sql_pager::protocol::DisplayMessage;
use sql_pager::services::{channel_pair, DisplayEndpoint, HostSession};
use sql_pager::table_display::TextRenderer;
use std::sync::Arc;

/// Records what the display was asked to draw
#[derive(Default)]
struct RecordingRenderer {
    columns: Vec<ColumnSpec>,
    rows: Vec<Row>,
    error: Option<String>,
    loading: bool,
    clears: usize,
}

impl Renderer for RecordingRenderer {
    fn clear(&mut self) {
        self.clears += 1;
        self.columns.clear();
        self.rows.clear();
        self.error = None;
    }

    fn set_columns(&mut self, columns: Vec<ColumnSpec>) {
        self.columns = columns;
    }

    fn replace_rows(&mut self, rows: Vec<Row>) {
        self.rows = rows;
    }

    fn append_rows(&mut self, rows: Vec<Row>) {
        self.rows.extend(rows);
    }

    fn show_error(&mut self, message: &str) {
        self.error = Some(message.to_string());
    }

    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }
}

fn events(count: i64) -> Arc<MemoryEngine> {
    let mut table = DataTable::new("events");
    table.add_column(DataColumn::new("id").with_type(DataType::Integer));
    table.add_column(DataColumn::new("day").with_type(DataType::Date));
    for i in 0..count {
        table
            .add_row(DataRow::new(vec![
                DataValue::Integer(i),
                DataValue::Date(format!("2024-01-{:02}", i % 28 + 1)),
            ]))
            .unwrap();
    }
    let mut engine = MemoryEngine::new();
    engine.register_table("events", table);
    Arc::new(engine)
}

async fn round_trip<R: Renderer>(
    sync: &mut DisplaySync<R>,
    display: &mut DisplayEndpoint,
    message: DisplayMessage,
) {
    display.send(message).await.unwrap();
    let reply = display.recv().await.unwrap();
    sync.on_host_message(reply);
}

#[tokio::test]
async fn test_scrolling_to_bottom_fetches_every_page() {
    let (host, mut display) = channel_pair(4);
    let session = HostSession::new(events(45), 20).spawn(host);
    let mut sync = DisplaySync::new(RecordingRenderer::default(), 20);

    let request = sync.submit("SELECT * FROM events");
    assert!(sync.renderer().loading);
    round_trip(&mut sync, &mut display, request).await;

    let renderer = sync.renderer();
    assert!(!renderer.loading);
    assert_eq!(renderer.rows.len(), 20);
    assert_eq!(renderer.columns[1].hint, DisplayHint::Date);

    // Not at the bottom yet, so nothing is requested
    assert!(sync.on_viewport(Viewport::new(0, 10, 20)).is_none());

    while sync.renderer().rows.len() < 45 {
        let rendered = sync.rendered_rows();
        let request = sync
            .on_viewport(Viewport::new(rendered - 10, 10, rendered))
            .unwrap();
        round_trip(&mut sync, &mut display, request).await;
    }

    let ids: Vec<i64> = sync
        .renderer()
        .rows
        .iter()
        .map(|row| row["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, (0..45).collect::<Vec<_>>());
    assert_eq!(sync.renderer().clears, 1);

    drop(display);
    session.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_new_query_replaces_grid_and_errors_show_verbatim() {
    let (host, mut display) = channel_pair(4);
    let session = HostSession::new(events(5), 20).spawn(host);
    let mut sync = DisplaySync::new(RecordingRenderer::default(), 20);

    let request = sync.submit("SELECT id FROM events");
    round_trip(&mut sync, &mut display, request).await;
    assert_eq!(sync.renderer().columns.len(), 1);

    let request = sync.submit("SELECT id FROM events WHERE");
    assert!(sync.renderer().rows.is_empty());
    round_trip(&mut sync, &mut display, request).await;

    let renderer = sync.renderer();
    assert_eq!(renderer.error.as_deref(), Some("syntax error near end of input"));
    assert!(renderer.columns.is_empty());
    assert_eq!(renderer.clears, 2);

    drop(display);
    session.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_text_renderer_prints_each_page() {
    let (host, mut display) = channel_pair(4);
    let session = HostSession::new(events(25), 10).spawn(host);
    let renderer = TextRenderer::new(Vec::new(), Vec::new(), CellFormats::default());
    let mut sync = DisplaySync::new(renderer, 10);

    let request = sync.submit("SELECT id, day FROM events");
    round_trip(&mut sync, &mut display, request).await;
    while sync.renderer().last_page_rows() == 10 {
        let rendered = sync.rendered_rows();
        let request = sync
            .on_viewport(Viewport::new(0, rendered, rendered))
            .unwrap();
        round_trip(&mut sync, &mut display, request).await;
    }

    assert_eq!(sync.renderer().total_rows(), 25);
    drop(display);
    session.await.unwrap().unwrap();

    let (out, err) = sync.into_renderer().into_inner();
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("10 rows (10 so far)"));
    assert!(out.contains("5 rows (25 so far)"));
    assert!(out.contains("2024-01-25"));
    assert!(err.is_empty());
}
