//! Error types for docling-worker

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Token exchange failed against {endpoint}: {reason}")]
    Auth { endpoint: String, reason: String },

    #[error("Failed to establish gateway connection: {0}")]
    Connection(String),

    #[error("Gateway call {operation} failed: {reason}")]
    Rpc {
        operation: &'static str,
        reason: String,
    },

    #[error("Failed to download document {document_id}: {reason}")]
    Download {
        document_id: String,
        reason: String,
    },

    #[error("Downloaded content does not match declared hash: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("Job processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WorkerError {
    /// True when the current gateway session can no longer be trusted and
    /// must be replaced before the next call.
    ///
    /// Everything else is local to the job being processed: the job is
    /// failed back to the orchestrator and the session keeps polling.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            WorkerError::Auth { .. } | WorkerError::Connection(_) | WorkerError::Rpc { .. }
        )
    }

    /// Short category label used in log lines.
    pub fn category(&self) -> &'static str {
        match self {
            WorkerError::Auth { .. } => "auth",
            WorkerError::Connection(_) => "connection",
            WorkerError::Rpc { .. } => "rpc",
            WorkerError::Download { .. } => "download",
            WorkerError::HashMismatch { .. } => "hash-mismatch",
            WorkerError::Processing(_) => "processing",
            WorkerError::Config(_) => "config",
            WorkerError::Io(_) => "io",
            WorkerError::Serialization(_) => "serialization",
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;
