use super::cursor::{ResultCursor, SubmissionToken};
use super::formatter::PageRequest;
use crate::engine::{Engine, EngineError, EngineErrorKind, Row, Schema};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    Idle,
    LoadingFresh,
    LoadingMore,
    Errored,
}

/// Which kind of request an event or reply belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    Fresh,
    More,
}

/// Engine work the coordinator wants done.
///
/// The coordinator never awaits anything itself. The caller executes the
/// call on whatever runtime it has and feeds the reply back through
/// [`QueryCoordinator::on_reply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// describe the query, then fetch its first page
    Fresh {
        token: SubmissionToken,
        query: String,
        page: PageRequest,
    },
    /// fetch one continuation page
    More {
        token: SubmissionToken,
        page: PageRequest,
    },
}

impl EngineCall {
    pub fn token(&self) -> SubmissionToken {
        match self {
            EngineCall::Fresh { token, .. } | EngineCall::More { token, .. } => *token,
        }
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            EngineCall::Fresh { .. } => RequestKind::Fresh,
            EngineCall::More { .. } => RequestKind::More,
        }
    }

    pub fn page(&self) -> &PageRequest {
        match self {
            EngineCall::Fresh { page, .. } | EngineCall::More { page, .. } => page,
        }
    }

    /// Perform the call. The reply carries the token the call was issued with.
    pub async fn execute<E: Engine + ?Sized>(self, engine: &E) -> EngineReply {
        match self {
            EngineCall::Fresh { token, query, page } => {
                debug!(target: "query", "{} describe", token);
                let result = match engine.describe(&query).await {
                    Ok(schema) => {
                        debug!(target: "query", "{} run offset {}", token, page.offset);
                        engine.run(&page.to_sql()).await.map(|rows| (schema, rows))
                    }
                    Err(e) => Err(e),
                };
                EngineReply::Fresh { token, result }
            }
            EngineCall::More { token, page } => {
                debug!(target: "query", "{} run offset {}", token, page.offset);
                let result = engine.run(&page.to_sql()).await;
                EngineReply::More { token, result }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineReply {
    Fresh {
        token: SubmissionToken,
        result: Result<(Schema, Vec<Row>), EngineError>,
    },
    More {
        token: SubmissionToken,
        result: Result<Vec<Row>, EngineError>,
    },
}

impl EngineReply {
    pub fn token(&self) -> SubmissionToken {
        match self {
            EngineReply::Fresh { token, .. } | EngineReply::More { token, .. } => *token,
        }
    }
}

/// What the display side needs to hear about
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorEvent {
    QueryReady {
        schema: Schema,
        rows: Vec<Row>,
        exhausted: bool,
    },
    PageAppended {
        rows: Vec<Row>,
        exhausted: bool,
    },
    Failed {
        origin: RequestKind,
        kind: EngineErrorKind,
        message: String,
    },
}

/// Owns the cursor for one document and decides which engine calls happen.
#[derive(Debug)]
pub struct QueryCoordinator {
    cursor: ResultCursor,
    state: LoadState,
    default_page_size: usize,
    // Text of the last submit, until something changes state
    last_submission: Option<String>,
}

impl QueryCoordinator {
    pub fn new(default_page_size: usize) -> Self {
        Self {
            cursor: ResultCursor::new(default_page_size),
            state: LoadState::Idle,
            default_page_size: default_page_size.max(1),
            last_submission: None,
        }
    }

    pub fn submit(&mut self, query: &str) -> Option<EngineCall> {
        self.submit_with_page_size(query, self.default_page_size)
    }

    /// Start a fresh submission, superseding whatever is in flight.
    ///
    /// Returns `None` when `query` repeats the previous submit with no state
    /// change in between.
    pub fn submit_with_page_size(&mut self, query: &str, page_size: usize) -> Option<EngineCall> {
        if self.last_submission.as_deref() == Some(query) {
            debug!(target: "query", "Ignoring repeated submission of identical query");
            return None;
        }

        let token = self.cursor.reset(query, page_size);
        self.state = LoadState::LoadingFresh;
        self.last_submission = Some(query.to_string());
        info!(target: "query", "Submission {}: {}", token, query.trim());

        Some(EngineCall::Fresh {
            token,
            query: query.to_string(),
            page: self.cursor.page_request(),
        })
    }

    /// Request the next page, if the cursor is idle and not exhausted
    pub fn load_more(&mut self) -> Option<EngineCall> {
        if self.state != LoadState::Idle || self.cursor.is_exhausted() {
            return None;
        }

        self.state = LoadState::LoadingMore;
        self.last_submission = None;
        let page = self.cursor.page_request();
        debug!(target: "query", "{} load more at offset {}", self.cursor.token(), page.offset);

        Some(EngineCall::More {
            token: self.cursor.token(),
            page,
        })
    }

    /// Apply a finished call. Replies for a superseded token are dropped.
    pub fn on_reply(&mut self, reply: EngineReply) -> Option<CoordinatorEvent> {
        if reply.token() != self.cursor.token() {
            debug!(
                target: "stale",
                "Dropping reply for {} (current is {})",
                reply.token(),
                self.cursor.token()
            );
            return None;
        }

        self.last_submission = None;

        match reply {
            EngineReply::Fresh { result, .. } => match result {
                Ok((schema, rows)) => {
                    self.cursor.advance(rows.len());
                    self.state = LoadState::Idle;
                    Some(CoordinatorEvent::QueryReady {
                        schema,
                        rows,
                        exhausted: self.cursor.is_exhausted(),
                    })
                }
                Err(e) => Some(self.fail(RequestKind::Fresh, e)),
            },
            EngineReply::More { result, .. } => match result {
                Ok(rows) => {
                    self.cursor.advance(rows.len());
                    self.state = LoadState::Idle;
                    Some(CoordinatorEvent::PageAppended {
                        rows,
                        exhausted: self.cursor.is_exhausted(),
                    })
                }
                Err(e) => Some(self.fail(RequestKind::More, e)),
            },
        }
    }

    fn fail(&mut self, origin: RequestKind, error: EngineError) -> CoordinatorEvent {
        warn!(target: "query", "{} failed: {}", self.cursor.token(), error);
        self.state = LoadState::Errored;
        CoordinatorEvent::Failed {
            origin,
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn cursor(&self) -> &ResultCursor {
        &self.cursor
    }

    pub fn default_page_size(&self) -> usize {
        self.default_page_size
    }
}
