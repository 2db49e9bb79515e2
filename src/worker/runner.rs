//! Job runner - main worker loop

use crate::config::ConnectionConfig;
use crate::error::Result;
use crate::gateway::GatewaySession;
use crate::worker::{JobProcessor, WorkerConfig};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

/// Job runner that claims and processes conversion jobs until shutdown.
///
/// The runner owns the gateway session. Session-fatal errors discard it and
/// open a fresh one (new channel plus freshly exchanged token) before the
/// next claim; job-local errors fail the single job and keep the session.
pub struct JobRunner {
    connection: ConnectionConfig,
    config: WorkerConfig,
    processor: JobProcessor,
    session: GatewaySession,
    shutdown: Arc<AtomicBool>,
}

impl JobRunner {
    /// Create a runner around an already opened session.
    pub fn new(
        connection: ConnectionConfig,
        config: WorkerConfig,
        processor: JobProcessor,
        session: GatewaySession,
    ) -> Self {
        Self {
            connection,
            config,
            processor,
            session,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a handle to signal shutdown
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Main worker loop
    ///
    /// Claims and processes jobs until shutdown is signaled. The activation
    /// long poll is the only blocking step, so an idle cycle goes straight
    /// into the next claim.
    pub async fn run(&mut self) -> Result<()> {
        info!("Starting docling worker...");
        info!("Job type: {}", self.config.job_type);
        info!("Poll timeout: {:?}", self.config.poll_timeout);
        info!(
            "Content hash verification: {}",
            if self.config.verify_content_hash {
                "enabled"
            } else {
                "disabled"
            }
        );

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                info!("Shutdown signal received, stopping worker...");
                break;
            }

            match self.process_one_job().await {
                Ok(true) => {
                    info!("Job finished, checking for next job...");
                }
                Ok(false) => {
                    // the long poll already waited server-side
                }
                Err(e) => {
                    error!("Worker error ({}): {}", e.category(), e);
                    self.reconnect().await;
                }
            }
        }

        self.session.close();
        info!("Worker stopped");
        Ok(())
    }

    /// Claim and handle a single job.
    ///
    /// Returns:
    /// - Ok(true) if a job was claimed (completed or failed back)
    /// - Ok(false) if the poll window elapsed with no job
    /// - Err only on session-fatal failures
    pub async fn process_one_job(&mut self) -> Result<bool> {
        let job = match self.session.activate_job(&self.config.job_type).await? {
            Some(job) => job,
            None => return Ok(false),
        };

        match self.processor.process(&self.session, &job).await {
            Ok(variables) => {
                self.session.complete_job(&job.key, &variables).await?;
            }
            Err(e) if e.is_session_fatal() => return Err(e),
            Err(e) => {
                warn!("Job {} failed ({}): {}", job.key, e.category(), e);
                let retries = (job.retries - 1).max(0);
                self.session
                    .fail_job(&job.key, retries, &e.to_string())
                    .await?;
            }
        }

        Ok(true)
    }

    /// Run a single claim attempt and exit (for testing)
    pub async fn run_once(&mut self) -> Result<bool> {
        info!("Running worker in single-job mode...");
        self.process_one_job().await
    }

    /// Replace the gateway session, retrying with capped exponential backoff
    /// plus jitter until a session is established or shutdown is signaled.
    async fn reconnect(&mut self) {
        self.session.close();
        let mut delay = self.config.reconnect_base_delay;

        for attempt in 1u32.. {
            if self.shutdown.load(Ordering::Relaxed) {
                return;
            }

            match GatewaySession::open(&self.connection).await {
                Ok(mut session) => {
                    session.set_activate_timeout(self.config.poll_timeout);
                    self.session = session;
                    info!("Reconnected to gateway on attempt {attempt}");
                    return;
                }
                Err(e) => {
                    let jitter_ms = rand::thread_rng().gen_range(0..=delay.as_millis() as u64 / 4);
                    let wait = delay + Duration::from_millis(jitter_ms);
                    warn!(
                        "Reconnect attempt {attempt} failed ({}): {}; retrying in {:?}",
                        e.category(),
                        e,
                        wait
                    );
                    sleep(wait).await;
                    delay = (delay * 2).min(self.config.reconnect_max_delay);
                }
            }
        }
    }
}

/// Setup signal handlers for graceful shutdown
pub fn setup_signal_handler(shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating shutdown...");
                shutdown.store(true, Ordering::Relaxed);
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    // The claim/complete/fail cycle is exercised end to end against a mock
    // gateway in tests/worker_cycle.rs.
}
