use super::formatter::PageRequest;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Identifies one submission; increases by one per `reset` on a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SubmissionToken(pub u64);

impl SubmissionToken {
    pub fn next(self) -> Self {
        SubmissionToken(self.0 + 1)
    }
}

impl fmt::Display for SubmissionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Pagination state for the current query
#[derive(Debug, Clone)]
pub struct ResultCursor {
    token: SubmissionToken,
    query: String,
    page_size: usize,
    offset: usize,
    exhausted: bool,
}

impl ResultCursor {
    /// A cursor with no query yet. It reports exhausted so nothing can page.
    pub fn new(page_size: usize) -> Self {
        Self {
            token: SubmissionToken::default(),
            query: String::new(),
            page_size: page_size.max(1),
            offset: 0,
            exhausted: true,
        }
    }

    /// Start over for a new submission and return the new token
    pub fn reset(&mut self, query: &str, page_size: usize) -> SubmissionToken {
        self.token = self.token.next();
        self.query = query.to_string();
        self.page_size = page_size.max(1);
        self.offset = 0;
        self.exhausted = false;
        debug!(target: "cursor", "Cursor {} reset (page size {})", self.token, self.page_size);
        self.token
    }

    /// Record a fetched page of `rows_returned` rows
    pub fn advance(&mut self, rows_returned: usize) {
        self.offset += self.page_size;
        self.exhausted = rows_returned < self.page_size;
        debug!(
            target: "cursor",
            "Cursor {} advanced to offset {} ({} rows, exhausted={})",
            self.token, self.offset, rows_returned, self.exhausted
        );
    }

    /// The request for the page at the current offset
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.query.clone(), self.page_size, self.offset)
    }

    pub fn token(&self) -> SubmissionToken {
        self.token
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}
