//! HTTP API module.
//!
//! This module provides the HTTP server, its request/response types and the
//! SSE log stream.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::{LogBroadcaster, LogEntry, LogLevel};
pub use server::{router, start_server, AppState, SharedState};
pub use types::{error_response, ListParams, SelectionRequest, UploadResponse};
