//! Worker module for claiming and processing conversion jobs
//!
//! This module provides:
//! - JobRunner: Main worker loop that long-polls the gateway for jobs
//! - JobProcessor: Processes individual jobs (download + convert + merge)
//! - WorkerConfig: Configuration for the worker

pub mod config;
pub mod processor;
pub mod runner;

pub use config::WorkerConfig;
pub use processor::JobProcessor;
pub use runner::{setup_signal_handler, JobRunner};
