//! Crate-level error type and `Result` alias.
//!
//! Every failure a client operation can produce maps to exactly one
//! variant; the library never retries or swallows errors, callers decide
//! their own policy.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("file not found: {path:?}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path:?}: {source}")]
    FileUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("service unreachable: {0}")]
    ServiceUnreachable(String),

    #[error("service error: HTTP {status}: {body}")]
    ServiceError { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("task not found: {task_id}")]
    TaskNotFound { task_id: String },

    #[error("unauthorized: seed rejected for task {task_id}")]
    Unauthorized { task_id: String },
}
