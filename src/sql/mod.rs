//! Query language for the in-memory engine.
pub mod parser;

pub use parser::{parse_statement, Parser, Statement};
