//! Client library for the Pandora file analysis service.
//!
//! [`ApiClient`] wraps the REST API of a Pandora instance: submit a file
//! for analysis, query the status of the resulting task, and query the
//! analysis workers. Every call is one blocking HTTP round trip; the
//! client never retries and never caches, so embedders keep full control
//! over polling and failure policy. The `pandora` binary is a thin
//! command-line wrapper over the same calls.

pub mod api_client;
pub mod args;
pub mod error;
pub mod runner;

pub use api_client::{ApiClient, SubmissionResult, TaskState, TaskStatus, WorkerReport};
pub use error::{Error, Result};
