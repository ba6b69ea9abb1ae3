use super::grid::ResultGrid;
use crate::config::{Config, LastQueryEntry, LastQueryStore};
use crate::display::{CellFormats, DisplaySync};
use crate::logging::LogRingBuffer;
use crate::protocol::DisplayMessage;
use crate::services::{channel_pair, DisplayEndpoint, HostSession, LoadedDocument};
use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::{Frame, Terminal};
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info, warn};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const LOG_PANE_HEIGHT: u16 = 10;
const CHANNEL_CAPACITY: usize = 32;

/// TUI application modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuiMode {
    Query,   // User is typing/editing queries
    Results, // User is scrolling results
}

/// Terminal front end for one open document
pub struct ExplorerTui {
    sync: DisplaySync<ResultGrid>,
    endpoint: DisplayEndpoint,
    input: Input,
    mode: TuiMode,
    status: String,
    log_buffer: Option<LogRingBuffer>,
    last_queries: Option<(LastQueryStore, PathBuf)>,
    show_logs: bool,
    viewport_dirty: bool,
    should_quit: bool,
}

impl ExplorerTui {
    pub fn new(sync: DisplaySync<ResultGrid>, endpoint: DisplayEndpoint, initial_query: &str) -> Self {
        Self {
            sync,
            endpoint,
            input: Input::new(initial_query.to_string()).with_cursor(initial_query.chars().count()),
            mode: TuiMode::Query,
            status: String::new(),
            log_buffer: None,
            last_queries: None,
            show_logs: false,
            viewport_dirty: false,
            should_quit: false,
        }
    }

    pub fn with_log_buffer(mut self, buffer: LogRingBuffer) -> Self {
        self.log_buffer = Some(buffer);
        self
    }

    /// Remember each submitted query as the last one for `data_file`
    pub fn with_last_queries(mut self, store: LastQueryStore, data_file: &Path) -> Self {
        self.last_queries = Some((store, data_file.to_path_buf()));
        self
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn mode(&self) -> TuiMode {
        self.mode
    }

    pub fn grid(&self) -> &ResultGrid {
        self.sync.renderer()
    }

    /// Submit whatever is in the query box
    pub fn submit_current_query(&mut self) {
        let sql = self.input.value().trim().to_string();
        if sql.is_empty() {
            return;
        }
        let message = self.sync.submit(&sql);
        self.send(message);
        self.mode = TuiMode::Results;

        if let Some((store, data_file)) = &mut self.last_queries {
            if let Err(e) = store.record(data_file, &sql) {
                warn!(target: "display", "Could not save last query: {:#}", e);
            }
        }
    }

    fn send(&mut self, message: DisplayMessage) {
        // This runs on the UI thread, outside the runtime
        if self.endpoint.blocking_send(message).is_err() {
            warn!(target: "display", "Host session is gone");
            self.status = "Query engine stopped".to_string();
        }
    }

    /// Apply every reply that has arrived. False once the host has gone away.
    pub fn drain_host_messages(&mut self) -> bool {
        loop {
            match self.endpoint.try_recv() {
                Ok(message) => {
                    let success = message.is_success();
                    self.sync.on_host_message(message);
                    if success {
                        // A short first page may already leave us at the bottom
                        self.viewport_dirty = true;
                    }
                }
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    /// Ask for more rows if the grid is scrolled to the end
    fn check_viewport(&mut self) {
        let viewport = self.sync.renderer().viewport();
        if let Some(message) = self.sync.on_viewport(viewport) {
            debug!(target: "display", "Viewport at bottom: {:?}", viewport);
            self.send(message);
        }
    }

    /// Main run loop
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        loop {
            if !self.drain_host_messages() {
                self.status = "Query engine stopped".to_string();
            }

            terminal.draw(|f| self.draw(f))?;

            if self.viewport_dirty {
                self.viewport_dirty = false;
                self.check_viewport();
            }

            if event::poll(POLL_INTERVAL)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        self.handle_key_event(key);
                    }
                    Event::Resize(_, _) => self.viewport_dirty = true,
                    _ => {}
                }
            }

            if self.should_quit {
                break;
            }
        }
        Ok(())
    }

    /// Handle keyboard input
    pub fn handle_key_event(&mut self, key: KeyEvent) {
        // Global keys
        if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        match key.code {
            KeyCode::Tab => {
                self.toggle_mode();
                return;
            }
            KeyCode::Esc => {
                self.mode = TuiMode::Query;
                return;
            }
            KeyCode::F(12) => {
                self.show_logs = !self.show_logs;
                self.viewport_dirty = true;
                return;
            }
            _ => {}
        }

        match self.mode {
            TuiMode::Query => self.handle_query_mode(key),
            TuiMode::Results => self.handle_results_mode(key),
        }
    }

    fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            TuiMode::Query => TuiMode::Results,
            TuiMode::Results => TuiMode::Query,
        };
    }

    fn handle_query_mode(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => self.submit_current_query(),
            _ => {
                self.input.handle_event(&Event::Key(key));
            }
        }
    }

    fn handle_results_mode(&mut self, key: KeyEvent) {
        let grid = self.sync.renderer_mut();
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => grid.select_next(),
            KeyCode::Up | KeyCode::Char('k') => grid.select_previous(),
            KeyCode::PageDown => grid.page_down(),
            KeyCode::PageUp => grid.page_up(),
            KeyCode::Home | KeyCode::Char('g') => grid.select_first(),
            KeyCode::End | KeyCode::Char('G') => grid.select_last(),
            KeyCode::Char('N') => {
                grid.toggle_row_numbers();
                return;
            }
            KeyCode::Char('q') if key.modifiers.is_empty() => {
                self.should_quit = true;
                return;
            }
            _ => return,
        }
        self.viewport_dirty = true;
    }

    /// Draw the UI
    fn draw(&mut self, f: &mut Frame) {
        let mut constraints = vec![
            Constraint::Length(3), // Query input area
            Constraint::Min(5),    // Results grid
        ];
        if self.show_logs {
            constraints.push(Constraint::Length(LOG_PANE_HEIGHT));
        }
        constraints.push(Constraint::Length(3)); // Status area
        constraints.push(Constraint::Length(1)); // Help line

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(f.area());

        self.draw_input(f, chunks[0]);

        let grid_area = chunks[1];
        self.sync.renderer_mut().set_area(grid_area);
        self.sync
            .renderer()
            .render(f, grid_area, self.mode == TuiMode::Results);

        let mut next = 2;
        if self.show_logs {
            self.draw_logs(f, chunks[next]);
            next += 1;
        }

        let mode_text = match self.mode {
            TuiMode::Query => "Query Mode",
            TuiMode::Results => "Results Mode",
        };
        let grid = self.sync.renderer();
        let mut status_parts = vec![format!("Mode: {}", mode_text)];
        status_parts.push(format!("Rows: {}", grid.row_count()));
        if grid.row_count() > 0 {
            status_parts.push(format!("Row {}", grid.selected() + 1));
        }
        if !self.status.is_empty() {
            status_parts.push(self.status.clone());
        }
        let status = Paragraph::new(status_parts.join(" | "))
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .alignment(Alignment::Left);
        f.render_widget(status, chunks[next]);

        let help = Paragraph::new(self.help_text())
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Left);
        f.render_widget(help, chunks[next + 1]);
    }

    fn draw_input(&self, f: &mut Frame, area: Rect) {
        let focused = self.mode == TuiMode::Query;
        let width = area.width.saturating_sub(2) as usize;
        let scroll = self.input.visual_scroll(width);

        let style = if focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let input = Paragraph::new(self.input.value())
            .scroll((0, scroll as u16))
            .block(Block::default().borders(Borders::ALL).title("Query").style(style));
        f.render_widget(input, area);

        if focused {
            let cursor = self.input.visual_cursor().max(scroll) - scroll;
            f.set_cursor_position((area.x + cursor as u16 + 1, area.y + 1));
        }
    }

    fn draw_logs(&self, f: &mut Frame, area: Rect) {
        let lines: Vec<String> = self
            .log_buffer
            .as_ref()
            .map(|buffer| {
                buffer
                    .get_recent(area.height.saturating_sub(2) as usize)
                    .iter()
                    .map(|entry| entry.format_for_display())
                    .collect()
            })
            .unwrap_or_default();
        let logs = Paragraph::new(lines.join("\n"))
            .style(Style::default().fg(Color::Gray))
            .block(Block::default().borders(Borders::ALL).title("Log (F12)"));
        f.render_widget(logs, area);
    }

    fn help_text(&self) -> &'static str {
        match self.mode {
            TuiMode::Query => {
                "Query Mode: Type SQL | Enter: Execute | Tab: Switch to Results | F12: Log | Ctrl+Q: Quit"
            }
            TuiMode::Results => {
                "Results Mode: ↑↓/jk: Navigate | PgUp/PgDn | Home/End | N: Row numbers | Tab/Esc: Query | Ctrl+Q: Quit"
            }
        }
    }
}

/// Query the explorer opens with: an explicit one, else the last one
/// submitted against the file, else the document default
fn starting_query(
    explicit: Option<String>,
    last: Option<&LastQueryEntry>,
    default_query: &str,
) -> String {
    explicit
        .or_else(|| last.map(|entry| entry.sql.clone()))
        .unwrap_or_else(|| default_query.to_string())
}

/// Open the explorer on a loaded document.
///
/// The host session runs on `runtime` while the terminal loop owns the
/// calling thread.
pub fn run_explorer(
    document: LoadedDocument,
    config: &Config,
    explicit_query: Option<String>,
    log_buffer: LogRingBuffer,
    runtime: &tokio::runtime::Runtime,
) -> Result<()> {
    let status = document.status_message();
    info!(target: "display", "{}", status);

    let last_queries = match LastQueryStore::open_default() {
        Ok(store) => Some(store),
        Err(e) => {
            warn!(target: "config", "Last queries unavailable: {:#}", e);
            None
        }
    };
    let initial_query = starting_query(
        explicit_query,
        last_queries
            .as_ref()
            .and_then(|store| store.get(&document.source_path)),
        &document.default_query,
    );

    let page_size = config.query.page_size;
    let (host, display) = channel_pair(CHANNEL_CAPACITY);
    let session = HostSession::new(Arc::new(document.engine), page_size);
    let session_task = runtime.spawn(session.serve(host));

    let grid = ResultGrid::new(
        CellFormats::from(&config.display),
        config.display.show_row_numbers,
    );
    let mut app = ExplorerTui::new(DisplaySync::new(grid, page_size), display, &initial_query)
        .with_log_buffer(log_buffer);
    if let Some(store) = last_queries {
        app = app.with_last_queries(store, &document.source_path);
    }
    app.set_status(status);

    if config.behavior.auto_execute_on_load {
        app.submit_current_query();
    }

    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    // Run the app
    let result = app.run(&mut terminal);

    // Cleanup
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to restore cursor")?;

    // Closing the display side ends the session
    drop(app);
    match runtime.block_on(session_task) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(target: "transport", "Host session ended with error: {:#}", e),
        Err(e) => warn!(target: "transport", "Host session task failed: {}", e),
    }

    result.context("TUI execution failed")
}
