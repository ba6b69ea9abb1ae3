use crate::display::{format_cell, CellFormats, ColumnSpec, Renderer};
use crate::engine::Row;
use comfy_table::{Attribute, Cell, CellAlignment, ContentArrangement, Table};
use crossterm::style::Stylize;
use serde_json::Value;
use std::io::Write;

/// Prints each page as a table as it arrives
pub struct TextRenderer<W: Write, E: Write> {
    out: W,
    err: E,
    columns: Vec<ColumnSpec>,
    formats: CellFormats,
    styled: bool,
    total_rows: usize,
    last_page_rows: usize,
    failed: bool,
    closed: bool,
}

impl TextRenderer<std::io::Stdout, std::io::Stderr> {
    pub fn stdout(formats: CellFormats) -> Self {
        Self::new(std::io::stdout(), std::io::stderr(), formats).with_style(true)
    }
}

impl<W: Write, E: Write> TextRenderer<W, E> {
    pub fn new(out: W, err: E, formats: CellFormats) -> Self {
        Self {
            out,
            err,
            columns: Vec::new(),
            formats,
            styled: false,
            total_rows: 0,
            last_page_rows: 0,
            failed: false,
            closed: false,
        }
    }

    /// Colour the summary lines
    pub fn with_style(mut self, styled: bool) -> Self {
        self.styled = styled;
        self
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn last_page_rows(&self) -> usize {
        self.last_page_rows
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    /// The output stopped accepting writes, e.g. a closed pipe
    pub fn closed(&self) -> bool {
        self.closed
    }

    pub fn into_inner(self) -> (W, E) {
        (self.out, self.err)
    }

    fn build_table(&self, rows: &[Row]) -> Table {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);

        table.set_header(
            self.columns
                .iter()
                .map(|c| Cell::new(&c.title).add_attribute(Attribute::Bold)),
        );

        for row in rows {
            table.add_row(self.columns.iter().map(|column| {
                let value = row.get(&column.name).unwrap_or(&Value::Null);
                let cell = Cell::new(format_cell(value, column.hint, &self.formats));
                if column.hint.is_numeric() {
                    cell.set_alignment(CellAlignment::Right)
                } else {
                    cell
                }
            }));
        }
        table
    }

    fn print_page(&mut self, rows: Vec<Row>) {
        self.last_page_rows = rows.len();
        self.total_rows += rows.len();
        if self.closed {
            return;
        }

        let written = if rows.is_empty() {
            if self.total_rows > 0 {
                return;
            }
            let text = "No results found.";
            if self.styled {
                writeln!(self.out, "{}", text.yellow())
            } else {
                writeln!(self.out, "{}", text)
            }
        } else {
            let table = self.build_table(&rows);
            let summary = format!("{} rows ({} so far)", rows.len(), self.total_rows);
            writeln!(self.out, "{table}").and_then(|_| {
                if self.styled {
                    writeln!(self.out, "{}", summary.green())
                } else {
                    writeln!(self.out, "{}", summary)
                }
            })
        };

        if written.and_then(|_| self.out.flush()).is_err() {
            self.closed = true;
        }
    }
}

impl<W: Write, E: Write> Renderer for TextRenderer<W, E> {
    fn clear(&mut self) {
        self.columns.clear();
        self.total_rows = 0;
        self.last_page_rows = 0;
        self.failed = false;
    }

    fn set_columns(&mut self, columns: Vec<ColumnSpec>) {
        self.columns = columns;
    }

    fn replace_rows(&mut self, rows: Vec<Row>) {
        self.total_rows = 0;
        self.print_page(rows);
    }

    fn append_rows(&mut self, rows: Vec<Row>) {
        self.print_page(rows);
    }

    fn show_error(&mut self, message: &str) {
        self.failed = true;
        let _ = if self.styled {
            writeln!(self.err, "{}", message.red())
        } else {
            writeln!(self.err, "{}", message)
        };
    }

    fn set_loading(&mut self, _loading: bool) {}
}
