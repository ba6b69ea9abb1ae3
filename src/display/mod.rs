//! Display-side reconciliation of host replies into render operations.
//!
//! [`DisplaySync`] knows nothing about terminals or tables. It turns host
//! messages into calls on a [`Renderer`] and turns scroll positions into
//! `more` requests.

pub mod column_hint;

pub use column_hint::{format_cell, CellFormats, DisplayHint};

use crate::engine::{ColumnDescription, Row, Schema};
use crate::protocol::{DisplayMessage, HostMessage};
use tracing::debug;

/// One rendered column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub title: String,
    pub column_type: String,
    pub hint: DisplayHint,
}

impl ColumnSpec {
    pub fn from_description(column: &ColumnDescription) -> Self {
        Self {
            name: column.name.clone(),
            title: column.name.clone(),
            column_type: column.column_type.clone(),
            hint: DisplayHint::from_type_tag(&column.column_type),
        }
    }

    pub fn from_schema(schema: &Schema) -> Vec<Self> {
        schema.iter().map(Self::from_description).collect()
    }
}

/// Whatever draws the grid
pub trait Renderer {
    /// Drop columns, rows and any error
    fn clear(&mut self);
    fn set_columns(&mut self, columns: Vec<ColumnSpec>);
    fn replace_rows(&mut self, rows: Vec<Row>);
    fn append_rows(&mut self, rows: Vec<Row>);
    /// Hide the grid and show `message` in its place
    fn show_error(&mut self, message: &str);
    fn set_loading(&mut self, loading: bool);
}

/// Scroll geometry of the rendered area, in rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub scroll_top: usize,
    pub visible_height: usize,
    pub content_height: usize,
}

impl Viewport {
    pub fn new(scroll_top: usize, visible_height: usize, content_height: usize) -> Self {
        Self {
            scroll_top,
            visible_height,
            content_height,
        }
    }

    pub fn at_bottom(&self) -> bool {
        self.scroll_top + self.visible_height >= self.content_height
    }
}

pub struct DisplaySync<R: Renderer> {
    renderer: R,
    page_size: usize,
    current_sql: Option<String>,
    rendered_rows: usize,
}

impl<R: Renderer> DisplaySync<R> {
    pub fn new(renderer: R, page_size: usize) -> Self {
        Self {
            renderer,
            page_size,
            current_sql: None,
            rendered_rows: 0,
        }
    }

    /// Start a fresh query: clear the grid and build the request
    pub fn submit(&mut self, sql: &str) -> DisplayMessage {
        self.renderer.clear();
        self.renderer.set_loading(true);
        self.current_sql = Some(sql.to_string());
        self.rendered_rows = 0;

        DisplayMessage::Query {
            sql: sql.to_string(),
            limit: self.page_size,
        }
    }

    pub fn on_host_message(&mut self, message: HostMessage) {
        self.renderer.set_loading(false);

        match message {
            HostMessage::Query {
                success: true,
                results,
                describe,
                ..
            } => {
                let columns = ColumnSpec::from_schema(&describe.unwrap_or_default());
                let rows = results.unwrap_or_default();
                debug!(target: "display", "Replacing grid: {} columns, {} rows", columns.len(), rows.len());
                self.rendered_rows = rows.len();
                self.renderer.set_columns(columns);
                self.renderer.replace_rows(rows);
            }
            HostMessage::More {
                success: true,
                results,
                ..
            } => {
                let rows = results.unwrap_or_default();
                debug!(target: "display", "Appending {} rows", rows.len());
                self.rendered_rows += rows.len();
                self.renderer.append_rows(rows);
            }
            HostMessage::Query { message, .. } | HostMessage::More { message, .. } => {
                let message = message.unwrap_or_default();
                debug!(target: "display", "Showing error: {}", message);
                self.renderer.show_error(&message);
            }
        }
    }

    /// A `more` request when the visible area reaches the end of the content.
    ///
    /// Fires on every call at the bottom; the host decides whether a page
    /// is actually due.
    pub fn on_viewport(&self, viewport: Viewport) -> Option<DisplayMessage> {
        if !viewport.at_bottom() {
            return None;
        }
        let sql = self.current_sql.as_ref()?;
        Some(DisplayMessage::More {
            sql: sql.clone(),
            limit: self.page_size,
            offset: self.rendered_rows,
        })
    }

    pub fn rendered_rows(&self) -> usize {
        self.rendered_rows
    }

    pub fn current_sql(&self) -> Option<&str> {
        self.current_sql.as_deref()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl Renderer for Recorder {
        fn clear(&mut self) {
            self.calls.push("clear".into());
        }
        fn set_columns(&mut self, columns: Vec<ColumnSpec>) {
            self.calls.push(format!("columns {}", columns.len()));
        }
        fn replace_rows(&mut self, rows: Vec<Row>) {
            self.calls.push(format!("replace {}", rows.len()));
        }
        fn append_rows(&mut self, rows: Vec<Row>) {
            self.calls.push(format!("append {}", rows.len()));
        }
        fn show_error(&mut self, message: &str) {
            self.calls.push(format!("error {}", message));
        }
        fn set_loading(&mut self, loading: bool) {
            self.calls.push(format!("loading {}", loading));
        }
    }

    #[test]
    fn test_viewport_bottom_detection() {
        assert!(Viewport::new(80, 20, 100).at_bottom());
        assert!(!Viewport::new(79, 20, 100).at_bottom());
        assert!(Viewport::new(0, 20, 0).at_bottom());
    }

    #[test]
    fn test_no_more_before_submit() {
        let sync = DisplaySync::new(Recorder::default(), 100);
        assert!(sync.on_viewport(Viewport::new(0, 10, 0)).is_none());
    }

    #[test]
    fn test_columns_before_rows_and_errors_verbatim() {
        let mut sync = DisplaySync::new(Recorder::default(), 100);
        sync.submit("SELECT * FROM data");
        sync.on_host_message(HostMessage::query_results(
            Schema::new(vec![ColumnDescription::new("d", "DATE")]),
            vec![Row::new(), Row::new()],
        ));
        sync.on_host_message(HostMessage::more_error("column px not found"));

        assert_eq!(
            sync.renderer().calls,
            vec![
                "clear",
                "loading true",
                "loading false",
                "columns 1",
                "replace 2",
                "loading false",
                "error column px not found",
            ]
        );
    }

    #[test]
    fn test_more_request_carries_rendered_count() {
        let mut sync = DisplaySync::new(Recorder::default(), 2);
        sync.submit("q");
        sync.on_host_message(HostMessage::query_results(Schema::default(), vec![Row::new(); 2]));
        sync.on_host_message(HostMessage::more_results(vec![Row::new()]));

        assert_eq!(
            sync.on_viewport(Viewport::new(0, 10, 3)),
            Some(DisplayMessage::More {
                sql: "q".to_string(),
                limit: 2,
                offset: 3
            })
        );
        assert!(sync.on_viewport(Viewport::new(0, 1, 3)).is_none());
    }
}
