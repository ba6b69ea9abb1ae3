use crate::display::{format_cell, CellFormats, ColumnSpec, Renderer, Viewport};
use crate::engine::Row as ResultRow;
use ratatui::{
    layout::{Alignment, Constraint, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap},
    Frame,
};
use serde_json::Value;

/// Widest a column is allowed to grow, in characters
const MAX_COLUMN_WIDTH: usize = 40;

/// Rows reserved by the border and header
const CHROME_HEIGHT: u16 = 3;

/// Scrollable grid of result rows
pub struct ResultGrid {
    columns: Vec<ColumnSpec>,
    rows: Vec<ResultRow>,
    error: Option<String>,
    loading: bool,
    formats: CellFormats,
    show_row_numbers: bool,
    selected: usize,
    scroll_top: usize,
    visible_height: usize,
}

impl ResultGrid {
    pub fn new(formats: CellFormats, show_row_numbers: bool) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            error: None,
            loading: false,
            formats,
            show_row_numbers,
            selected: 0,
            scroll_top: 0,
            visible_height: 20,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn toggle_row_numbers(&mut self) {
        self.show_row_numbers = !self.show_row_numbers;
    }

    /// Current scroll geometry, as seen by the pager
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.scroll_top, self.visible_height, self.rows.len())
    }

    /// Resize the visible window to fit `area`
    pub fn set_area(&mut self, area: Rect) {
        self.visible_height = area.height.saturating_sub(CHROME_HEIGHT).max(1) as usize;
        self.keep_selection_visible();
    }

    // Navigation

    pub fn select_next(&mut self) {
        self.select(self.selected.saturating_add(1));
    }

    pub fn select_previous(&mut self) {
        self.select(self.selected.saturating_sub(1));
    }

    pub fn page_down(&mut self) {
        self.select(self.selected.saturating_add(self.visible_height));
    }

    pub fn page_up(&mut self) {
        self.select(self.selected.saturating_sub(self.visible_height));
    }

    pub fn select_first(&mut self) {
        self.select(0);
    }

    pub fn select_last(&mut self) {
        self.select(self.rows.len().saturating_sub(1));
    }

    fn select(&mut self, row: usize) {
        self.selected = row.min(self.rows.len().saturating_sub(1));
        self.keep_selection_visible();
    }

    fn keep_selection_visible(&mut self) {
        if self.selected < self.scroll_top {
            self.scroll_top = self.selected;
        } else if self.selected >= self.scroll_top + self.visible_height {
            self.scroll_top = self.selected + 1 - self.visible_height;
        }
    }

    fn window(&self) -> &[ResultRow] {
        let start = self.scroll_top.min(self.rows.len());
        let end = (start + self.visible_height).min(self.rows.len());
        &self.rows[start..end]
    }

    fn cell_text(&self, row: &ResultRow, column: &ColumnSpec) -> String {
        let value = row.get(&column.name).unwrap_or(&Value::Null);
        format_cell(value, column.hint, &self.formats)
    }

    fn column_widths(&self) -> Vec<Constraint> {
        let mut widths = Vec::new();
        if self.show_row_numbers {
            widths.push(Constraint::Length(8));
        }
        for column in &self.columns {
            let widest = self
                .window()
                .iter()
                .map(|row| self.cell_text(row, column).chars().count())
                .chain(std::iter::once(column.title.chars().count()))
                .max()
                .unwrap_or(0);
            widths.push(Constraint::Length(widest.min(MAX_COLUMN_WIDTH) as u16));
        }
        widths
    }

    fn title(&self) -> String {
        let mut title = format!("Results ({} rows)", self.rows.len());
        if self.loading {
            title.push_str(" loading...");
        }
        title
    }

    pub fn render(&self, f: &mut Frame, area: Rect, focused: bool) {
        let border_style = if focused {
            Style::default()
        } else {
            Style::default().fg(Color::DarkGray)
        };

        if let Some(error) = &self.error {
            let paragraph = Paragraph::new(error.as_str())
                .style(Style::default().fg(Color::Red))
                .wrap(Wrap { trim: false })
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title("Error")
                        .border_style(border_style),
                );
            f.render_widget(paragraph, area);
            return;
        }

        if self.columns.is_empty() {
            let text = if self.loading {
                "Loading..."
            } else {
                "No results"
            };
            let empty = Paragraph::new(text)
                .style(Style::default().fg(Color::Yellow))
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(self.title())
                        .border_style(border_style),
                );
            f.render_widget(empty, area);
            return;
        }

        let mut header_cells = Vec::new();
        if self.show_row_numbers {
            header_cells.push(
                Cell::from("#").style(
                    Style::default()
                        .fg(Color::Magenta)
                        .add_modifier(Modifier::BOLD),
                ),
            );
        }
        header_cells.extend(self.columns.iter().map(|column| {
            Cell::from(column.title.clone()).style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
        }));

        let rows: Vec<Row> = self
            .window()
            .iter()
            .enumerate()
            .map(|(offset, row)| {
                let row_index = self.scroll_top + offset;
                let mut cells = Vec::new();
                if self.show_row_numbers {
                    cells.push(
                        Cell::from((row_index + 1).to_string())
                            .style(Style::default().fg(Color::DarkGray)),
                    );
                }
                for column in &self.columns {
                    let text = self.cell_text(row, column);
                    let line = if column.hint.is_numeric() {
                        Line::from(text).alignment(Alignment::Right)
                    } else {
                        Line::from(text)
                    };
                    cells.push(Cell::from(line));
                }

                let style = if row_index == self.selected && focused {
                    Style::default()
                        .bg(Color::DarkGray)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                Row::new(cells).style(style)
            })
            .collect();

        let table = Table::new(rows, self.column_widths())
            .header(Row::new(header_cells))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(self.title())
                    .border_style(border_style),
            )
            .column_spacing(1);

        f.render_widget(table, area);
    }
}

impl Renderer for ResultGrid {
    fn clear(&mut self) {
        self.columns.clear();
        self.rows.clear();
        self.error = None;
        self.selected = 0;
        self.scroll_top = 0;
    }

    fn set_columns(&mut self, columns: Vec<ColumnSpec>) {
        self.error = None;
        self.columns = columns;
    }

    fn replace_rows(&mut self, rows: Vec<ResultRow>) {
        self.rows = rows;
        self.selected = 0;
        self.scroll_top = 0;
    }

    fn append_rows(&mut self, rows: Vec<ResultRow>) {
        self.rows.extend(rows);
    }

    fn show_error(&mut self, message: &str) {
        self.error = Some(message.to_string());
    }

    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ColumnDescription, Schema};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use serde_json::json;

    fn rows(n: usize) -> Vec<ResultRow> {
        (0..n)
            .map(|i| {
                let mut row = ResultRow::new();
                row.insert("id".to_string(), json!(i));
                row
            })
            .collect()
    }

    fn grid_with(n: usize) -> ResultGrid {
        let mut grid = ResultGrid::new(CellFormats::default(), false);
        grid.set_columns(ColumnSpec::from_schema(&Schema::new(vec![
            ColumnDescription::new("id", "BIGINT"),
        ])));
        grid.replace_rows(rows(n));
        grid.set_area(Rect::new(0, 0, 40, 13)); // 10 visible rows
        grid
    }

    #[test]
    fn test_navigation_reaches_bottom() {
        let mut grid = grid_with(25);
        assert!(!grid.viewport().at_bottom());

        grid.page_down();
        grid.page_down();
        assert_eq!(grid.selected(), 20);
        assert!(!grid.viewport().at_bottom());

        grid.select_last();
        assert_eq!(grid.viewport(), Viewport::new(15, 10, 25));
        assert!(grid.viewport().at_bottom());

        grid.select_first();
        assert_eq!(grid.viewport().scroll_top, 0);
    }

    #[test]
    fn test_append_keeps_scroll_position() {
        let mut grid = grid_with(10);
        grid.select_last();
        grid.append_rows(rows(10));
        assert_eq!(grid.row_count(), 20);
        assert_eq!(grid.selected(), 9);
        assert!(!grid.viewport().at_bottom());
    }

    #[test]
    fn test_error_replaces_grid() {
        let mut grid = grid_with(3);
        grid.show_error("syntax error near \"FROM\"");

        let mut terminal = Terminal::new(TestBackend::new(40, 8)).unwrap();
        terminal
            .draw(|f| grid.render(f, f.area(), true))
            .unwrap();
        let screen: String = terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(screen.contains("syntax error"));

        grid.clear();
        assert!(grid.error().is_none());
        assert_eq!(grid.row_count(), 0);
    }
}
