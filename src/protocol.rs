//! Messages exchanged between the host session and a display surface.
//!
//! Both directions are JSON objects tagged by `type`. Fields that are absent
//! are left out of the encoding entirely.

use crate::engine::{Row, Schema};
use crate::query::{CoordinatorEvent, RequestKind};
use serde::{Deserialize, Serialize};

/// Host to display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HostMessage {
    Query {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        results: Option<Vec<Row>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        describe: Option<Schema>,
    },
    More {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        results: Option<Vec<Row>>,
    },
}

impl HostMessage {
    pub fn query_results(schema: Schema, rows: Vec<Row>) -> Self {
        HostMessage::Query {
            success: true,
            message: None,
            results: Some(rows),
            describe: Some(schema),
        }
    }

    pub fn query_error(message: impl Into<String>) -> Self {
        HostMessage::Query {
            success: false,
            message: Some(message.into()),
            results: None,
            describe: None,
        }
    }

    pub fn more_results(rows: Vec<Row>) -> Self {
        HostMessage::More {
            success: true,
            message: None,
            results: Some(rows),
        }
    }

    pub fn more_error(message: impl Into<String>) -> Self {
        HostMessage::More {
            success: false,
            message: Some(message.into()),
            results: None,
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            HostMessage::Query { success, .. } | HostMessage::More { success, .. } => *success,
        }
    }
}

impl From<CoordinatorEvent> for HostMessage {
    fn from(event: CoordinatorEvent) -> Self {
        match event {
            CoordinatorEvent::QueryReady { schema, rows, .. } => {
                HostMessage::query_results(schema, rows)
            }
            CoordinatorEvent::PageAppended { rows, .. } => HostMessage::more_results(rows),
            CoordinatorEvent::Failed {
                origin: RequestKind::Fresh,
                message,
                ..
            } => HostMessage::query_error(message),
            CoordinatorEvent::Failed {
                origin: RequestKind::More,
                message,
                ..
            } => HostMessage::more_error(message),
        }
    }
}

/// Display to host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DisplayMessage {
    Query { sql: String, limit: usize },
    More { sql: String, limit: usize, offset: usize },
}

impl DisplayMessage {
    pub fn sql(&self) -> &str {
        match self {
            DisplayMessage::Query { sql, .. } | DisplayMessage::More { sql, .. } => sql,
        }
    }
}
