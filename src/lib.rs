//! Page through the results of arbitrary SQL over a data file.
//!
//! A display surface submits queries and scrolls; the host session wraps
//! each query into bounded `LIMIT`/`OFFSET` pages, fetches them from an
//! [`engine::Engine`] and streams them back, discarding replies that a newer
//! submission has made stale.

pub mod config;
pub mod data;
pub mod display;
pub mod engine;
pub mod logging;
pub mod protocol;
pub mod query;
pub mod services;
pub mod sql;
pub mod table_display;
pub mod ui;
