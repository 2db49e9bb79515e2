//! Gateway session and job lifecycle calls
//!
//! One [`GatewaySession`] bundles the HTTP channel and the bearer token used
//! for every call against the cluster. A session is either fully usable or
//! discarded; recovery replaces it wholesale instead of repairing fields in
//! place.

use crate::auth::TokenProvider;
use crate::config::ConnectionConfig;
use crate::error::{Result, WorkerError};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Default long-poll window for one activation request, in milliseconds.
const DEFAULT_ACTIVATE_TIMEOUT_MS: u64 = 60_000;

/// Name reported to the orchestrator on activation.
const WORKER_NAME: &str = "docling-worker";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ActivateJobsRequest<'a> {
    #[serde(rename = "type")]
    job_type: &'a str,
    max_jobs_to_activate: u32,
    timeout: u64,
    request_timeout: u64,
    worker: &'a str,
}

#[derive(Debug, Deserialize)]
struct ActivateJobsResponse {
    #[serde(default)]
    jobs: Vec<ActivatedJob>,
}

#[derive(Debug, Serialize)]
struct CompleteJobRequest<'a> {
    variables: &'a Map<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FailJobRequest<'a> {
    retries: i32,
    error_message: &'a str,
}

/// One claimed job, as returned by the activation endpoint.
///
/// The claim itself is immutable; completion submits a derived variable map
/// instead of mutating this value.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivatedJob {
    #[serde(rename = "jobKey", alias = "key")]
    pub key: String,
    #[serde(rename = "type", default)]
    pub job_type: String,
    #[serde(default)]
    pub retries: i32,
    #[serde(default)]
    pub variables: Map<String, Value>,
}

/// Authenticated channel to the orchestration gateway.
pub struct GatewaySession {
    client: Client,
    base_url: String,
    token: String,
    activate_timeout_ms: u64,
    closed: bool,
}

impl GatewaySession {
    /// Establish a new session: exchange credentials for a token and build
    /// the HTTP channel for the mode-derived gateway address.
    pub async fn open(config: &ConnectionConfig) -> Result<Self> {
        let provider = TokenProvider::new(config)?;
        let token = provider.fetch_token(config).await?;
        let session = Self::with_base_url(config.rest_base_url(), token)?;
        info!("gateway session established against {}", session.base_url);
        Ok(session)
    }

    /// Build a session against an explicit base URL with an already issued
    /// token.
    pub fn with_base_url(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| WorkerError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            activate_timeout_ms: DEFAULT_ACTIVATE_TIMEOUT_MS,
            closed: false,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn bearer_token(&self) -> &str {
        &self.token
    }

    /// Override the long-poll window used by [`Self::activate_job`].
    pub fn set_activate_timeout(&mut self, timeout: Duration) {
        self.activate_timeout_ms = timeout.as_millis() as u64;
    }

    /// Long-poll claim for one job of the given type.
    ///
    /// Returns `Ok(None)` when the orchestrator has no matching job within
    /// the poll window. That outcome is a normal idle cycle and leaves the
    /// session usable; only transport or application failures return an
    /// error.
    pub async fn activate_job(&self, job_type: &str) -> Result<Option<ActivatedJob>> {
        debug!("activating jobs of type {job_type}");

        let request = ActivateJobsRequest {
            job_type,
            max_jobs_to_activate: 1,
            timeout: self.activate_timeout_ms,
            request_timeout: self.activate_timeout_ms,
            worker: WORKER_NAME,
        };

        let url = format!("{}/v2/jobs/activation", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            // leave the server room to answer after the poll window closes
            .timeout(Duration::from_millis(self.activate_timeout_ms + 10_000))
            .json(&request)
            .send()
            .await
            .map_err(|e| rpc_error("ActivateJobs", e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(rpc_error("ActivateJobs", format!("HTTP {status}: {body}")));
        }

        let batch: ActivateJobsResponse = response
            .json()
            .await
            .map_err(|e| rpc_error("ActivateJobs", format!("invalid response body: {e}")))?;

        let job = batch.jobs.into_iter().next();
        match &job {
            Some(job) => info!("activated job {} (type {})", job.key, job.job_type),
            None => debug!("no {job_type} job available"),
        }
        Ok(job)
    }

    /// Submit the job's completion with the merged variable map.
    ///
    /// The orchestrator decides whether the job is still owned by this
    /// worker; a rejected completion surfaces as an error and is not retried
    /// here.
    pub async fn complete_job(&self, job_key: &str, variables: &Map<String, Value>) -> Result<()> {
        let url = format!("{}/v2/jobs/{}/completion", self.base_url, job_key);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .timeout(Duration::from_secs(30))
            .json(&CompleteJobRequest { variables })
            .send()
            .await
            .map_err(|e| rpc_error("CompleteJob", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(rpc_error("CompleteJob", format!("HTTP {status}: {body}")));
        }

        info!("completed job {job_key}");
        Ok(())
    }

    /// Report a job-local failure so the orchestrator can re-dispatch the
    /// job with the given remaining retries.
    pub async fn fail_job(&self, job_key: &str, retries: i32, error_message: &str) -> Result<()> {
        let url = format!("{}/v2/jobs/{}/failure", self.base_url, job_key);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .timeout(Duration::from_secs(30))
            .json(&FailJobRequest {
                retries,
                error_message,
            })
            .send()
            .await
            .map_err(|e| rpc_error("FailJob", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(rpc_error("FailJob", format!("HTTP {status}: {body}")));
        }

        info!("failed job {job_key} with {retries} retries left");
        Ok(())
    }

    /// Release the session. Safe to call more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        debug!("gateway session closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

fn rpc_error(operation: &'static str, reason: String) -> WorkerError {
    WorkerError::Rpc { operation, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session(server: &MockServer) -> GatewaySession {
        GatewaySession::with_base_url(server.uri(), "test-token").unwrap()
    }

    #[tokio::test]
    async fn test_activation_claims_first_job_of_batch() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/jobs/activation"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(serde_json::json!({
                "type": "converter.docling",
                "maxJobsToActivate": 1
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jobs": [
                    {
                        "jobKey": "42",
                        "type": "converter.docling",
                        "retries": 3,
                        "variables": {"outputVarName": "doc"}
                    },
                    {
                        "jobKey": "43",
                        "type": "converter.docling",
                        "retries": 3,
                        "variables": {}
                    }
                ]
            })))
            .mount(&server)
            .await;

        let job = session(&server)
            .activate_job("converter.docling")
            .await
            .unwrap()
            .expect("expected a job");

        assert_eq!(job.key, "42");
        assert_eq!(job.job_type, "converter.docling");
        assert_eq!(job.retries, 3);
        assert_eq!(job.variables["outputVarName"], "doc");
    }

    #[tokio::test]
    async fn test_empty_batch_is_not_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/jobs/activation"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "jobs": [] })),
            )
            .mount(&server)
            .await;

        let result = session(&server).activate_job("converter.docling").await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn test_activation_gateway_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/jobs/activation"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = session(&server)
            .activate_job("converter.docling")
            .await
            .unwrap_err();

        assert!(err.is_session_fatal());
        match err {
            WorkerError::Rpc { operation, reason } => {
                assert_eq!(operation, "ActivateJobs");
                assert!(reason.contains("502"), "unexpected reason: {reason}");
            }
            other => panic!("Expected Rpc error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_completion_sends_variables() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/jobs/42/completion"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(serde_json::json!({
                "variables": {"doc_md": "# A"}
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let mut variables = Map::new();
        variables.insert("doc_md".to_string(), Value::String("# A".to_string()));

        session(&server)
            .complete_job("42", &variables)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rejected_completion_is_rpc_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/jobs/42/completion"))
            .respond_with(ResponseTemplate::new(409).set_body_string("job not found"))
            .mount(&server)
            .await;

        let err = session(&server)
            .complete_job("42", &Map::new())
            .await
            .unwrap_err();
        assert!(err.is_session_fatal());
    }

    #[tokio::test]
    async fn test_fail_job_reports_remaining_retries() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/jobs/42/failure"))
            .and(body_partial_json(serde_json::json!({
                "retries": 2,
                "errorMessage": "boom"
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        session(&server).fail_job("42", 2, "boom").await.unwrap();
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let server = MockServer::start().await;
        let mut session = session(&server);

        assert!(!session.is_closed());
        session.close();
        assert!(session.is_closed());
        session.close();
        assert!(session.is_closed());
    }
}
