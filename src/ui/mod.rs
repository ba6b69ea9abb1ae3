//! Terminal front end: a query box over a scrolling result grid.
pub mod app;
pub mod grid;

pub use app::{run_explorer, ExplorerTui, TuiMode};
pub use grid::ResultGrid;
