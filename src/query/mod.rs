//! Incremental pagination: wrapping queries into pages, tracking the cursor,
//! and deciding which engine calls to make.
pub mod coordinator;
pub mod cursor;
pub mod formatter;

pub use coordinator::{
    CoordinatorEvent, EngineCall, EngineReply, LoadState, QueryCoordinator, RequestKind,
};
pub use cursor::{ResultCursor, SubmissionToken};
pub use formatter::{describe_statement, strip_terminator, wrap, PageRequest};
