//! Configuration module
//!
//! Settings are read once at startup from a TOML file. The last query
//! submitted against each data file is kept alongside it.

pub mod config;
pub mod last_query;

pub use config::{
    render_template, sanitize_table_name, BehaviorConfig, Config, DisplayConfig, LoggingConfig,
    QueryConfig,
};
pub use last_query::{LastQueryEntry, LastQueryStore};
