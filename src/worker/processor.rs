//! Job processor: payload parsing, document retrieval, conversion, merge

use crate::converter::{ConvertedDocument, DocumentConverter};
use crate::documents::{DocumentFetcher, DocumentRef};
use crate::error::{Result, WorkerError};
use crate::gateway::{ActivatedJob, GatewaySession};
use crate::worker::WorkerConfig;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Handles one claimed job end to end and returns the completion variables.
pub struct JobProcessor {
    config: WorkerConfig,
    fetcher: DocumentFetcher,
    converter: Arc<dyn DocumentConverter>,
}

impl JobProcessor {
    /// Create a new job processor
    pub fn new(config: WorkerConfig, converter: Arc<dyn DocumentConverter>) -> Result<Self> {
        let fetcher = DocumentFetcher::new(&config.docs_dir)?
            .with_hash_verification(config.verify_content_hash);

        Ok(Self {
            config,
            fetcher,
            converter,
        })
    }

    /// Process a claimed job and return the variable map to complete it
    /// with: the original variables plus the two conversion outputs.
    ///
    /// The claimed job is never mutated.
    pub async fn process(
        &self,
        session: &GatewaySession,
        job: &ActivatedJob,
    ) -> Result<Map<String, Value>> {
        let payload = JobPayload::parse(&job.variables)?;
        let path = self.fetcher.fetch(session, &payload.document).await?;

        let converted = self.converter.convert(&path).await;
        if self.config.cleanup_downloads {
            self.fetcher.remove(&path).await;
        }
        let converted = converted?;

        Ok(merge_outputs(
            &job.variables,
            &payload.output_var_name,
            &converted,
        ))
    }
}

/// The variables a conversion job must carry.
#[derive(Debug)]
struct JobPayload {
    output_var_name: String,
    document: DocumentRef,
}

impl JobPayload {
    /// Extract and validate the payload from a job's variable map.
    ///
    /// A malformed payload is a job-local `Processing` error: the job is
    /// failed back to the orchestrator while the session keeps polling.
    fn parse(variables: &Map<String, Value>) -> Result<Self> {
        let output_var_name = variables
            .get("outputVarName")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                WorkerError::Processing("job variables missing string outputVarName".to_string())
            })?
            .to_string();

        let documents = variables
            .get("document")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                WorkerError::Processing("job variables missing document list".to_string())
            })?;

        // only the first referenced document is consumed
        let first = documents
            .first()
            .ok_or_else(|| WorkerError::Processing("document list is empty".to_string()))?;

        let document: DocumentRef = serde_json::from_value(first.clone())
            .map_err(|e| WorkerError::Processing(format!("malformed document reference: {e}")))?;

        Ok(Self {
            output_var_name,
            document,
        })
    }
}

/// Original variables plus `<name>_md` / `<name>_html` conversion outputs.
/// Existing keys keep their values; output keys are overwritten.
fn merge_outputs(
    variables: &Map<String, Value>,
    output_var_name: &str,
    converted: &ConvertedDocument,
) -> Map<String, Value> {
    let mut merged = variables.clone();
    merged.insert(
        format!("{output_var_name}_md"),
        Value::String(converted.markdown.clone()),
    );
    merged.insert(
        format!("{output_var_name}_html"),
        Value::String(converted.html.clone()),
    );
    merged
}
