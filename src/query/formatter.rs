use serde::{Deserialize, Serialize};

pub const STATEMENT_TERMINATOR: char = ';';

/// Remove the first statement terminator, wherever it sits.
///
/// Only one is removed and it need not be trailing, so a `;` inside a
/// string literal is removed in preference to a real trailing one.
pub fn strip_terminator(query: &str) -> String {
    query.replacen(STATEMENT_TERMINATOR, "", 1)
}

/// Wrap `query` so it yields at most `page_size` rows starting at `offset`
pub fn wrap(query: &str, page_size: usize, offset: usize) -> String {
    format!(
        "SELECT * FROM (\n{}\n) LIMIT {} OFFSET {}",
        strip_terminator(query),
        page_size,
        offset
    )
}

/// Introspection form for engines that describe through their own language
pub fn describe_statement(query: &str) -> String {
    format!("DESCRIBE (\n{}\n)", strip_terminator(query))
}

/// One bounded window over a query's results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub query: String,
    pub page_size: usize,
    pub offset: usize,
}

impl PageRequest {
    pub fn new(query: impl Into<String>, page_size: usize, offset: usize) -> Self {
        Self {
            query: query.into(),
            page_size,
            offset,
        }
    }

    pub fn to_sql(&self) -> String {
        wrap(&self.query, self.page_size, self.offset)
    }
}
