//! Worker configuration

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Job type claimed from the orchestrator
    pub job_type: String,

    /// Long-poll window for one activation request
    pub poll_timeout: Duration,

    /// Initial delay between reconnection attempts (doubles each attempt)
    pub reconnect_base_delay: Duration,

    /// Maximum delay between reconnection attempts
    pub reconnect_max_delay: Duration,

    /// Directory downloaded documents are written to
    pub docs_dir: PathBuf,

    /// Verify downloaded payloads against the declared content hash
    pub verify_content_hash: bool,

    /// Remove the downloaded file once its job is finished
    pub cleanup_downloads: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            job_type: "converter.docling".to_string(),
            poll_timeout: Duration::from_secs(60),
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(60),
            docs_dir: PathBuf::from("./docs"),
            verify_content_hash: false,
            cleanup_downloads: true,
        }
    }
}

impl WorkerConfig {
    /// Create a new config builder
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::default()
    }
}

/// Builder for WorkerConfig
pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl WorkerConfigBuilder {
    /// Set the claimed job type
    pub fn job_type(mut self, job_type: &str) -> Self {
        self.config.job_type = job_type.to_string();
        self
    }

    /// Set the long-poll window
    pub fn poll_timeout(mut self, duration: Duration) -> Self {
        self.config.poll_timeout = duration;
        self
    }

    /// Set the long-poll window in seconds
    pub fn poll_timeout_secs(mut self, secs: u64) -> Self {
        self.config.poll_timeout = Duration::from_secs(secs);
        self
    }

    /// Set the reconnect backoff bounds
    pub fn reconnect_delays(mut self, base: Duration, max: Duration) -> Self {
        self.config.reconnect_base_delay = base;
        self.config.reconnect_max_delay = max;
        self
    }

    /// Set the download directory
    pub fn docs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.docs_dir = dir.into();
        self
    }

    /// Enable/disable client-side content hash verification
    pub fn verify_content_hash(mut self, enable: bool) -> Self {
        self.config.verify_content_hash = enable;
        self
    }

    /// Enable/disable removal of downloaded files after each job
    pub fn cleanup_downloads(mut self, enable: bool) -> Self {
        self.config.cleanup_downloads = enable;
        self
    }

    /// Build the config
    pub fn build(self) -> WorkerConfig {
        self.config
    }
}

impl Default for WorkerConfigBuilder {
    fn default() -> Self {
        Self {
            config: WorkerConfig::default(),
        }
    }
}
