//! Docling Worker - a job worker for document conversion in Camunda 8 processes
//!
//! The worker long-polls a cluster gateway for `converter.docling` jobs,
//! downloads the document each job references, converts it to Markdown and
//! HTML through a docling-serve instance, and completes the job with both
//! renderings merged into the job variables.
//!
//! Session handling is deliberately coarse: the bundle of HTTP channel and
//! bearer token is replaced wholesale whenever a gateway call fails for any
//! reason other than an empty poll. Malformed or failing jobs are reported
//! back per job and do not touch the session.

pub mod auth;
pub mod config;
pub mod converter;
pub mod documents;
pub mod error;
pub mod gateway;
pub mod worker;

pub use auth::TokenProvider;
pub use config::{ConnectionConfig, Mode};
pub use converter::{ConvertedDocument, DoclingConverter, DocumentConverter};
pub use documents::{sanitize_file_name, DocumentFetcher, DocumentMetadata, DocumentRef};
pub use error::{Result, WorkerError};
pub use gateway::{ActivatedJob, GatewaySession};
pub use worker::{setup_signal_handler, JobProcessor, JobRunner, WorkerConfig};
