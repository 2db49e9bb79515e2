//! Document retrieval from the cluster's document store

use crate::error::{Result, WorkerError};
use crate::gateway::GatewaySession;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reference to a stored document, as carried in job variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    pub document_id: String,
    pub content_hash: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub file_name: String,
}

/// Downloads referenced documents into a scoped working directory.
///
/// Uses the session's bearer token; the document store sits behind the same
/// gateway base URL as the job endpoints.
pub struct DocumentFetcher {
    client: Client,
    docs_dir: PathBuf,
    verify_content_hash: bool,
}

impl DocumentFetcher {
    pub fn new(docs_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| WorkerError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            docs_dir: docs_dir.into(),
            verify_content_hash: false,
        })
    }

    /// Enable or disable client-side verification of the declared content
    /// hash. The store verifies it server-side either way.
    pub fn with_hash_verification(mut self, enable: bool) -> Self {
        self.verify_content_hash = enable;
        self
    }

    /// Download one document and return the local file path.
    pub async fn fetch(&self, session: &GatewaySession, doc: &DocumentRef) -> Result<PathBuf> {
        let url = format!(
            "{}/v2/documents/{}?contentHash={}",
            session.base_url(),
            doc.document_id,
            doc.content_hash
        );
        debug!("downloading document from {url}");

        let response = self
            .client
            .get(&url)
            .bearer_auth(session.bearer_token())
            .send()
            .await
            .map_err(|e| self.download_error(doc, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.download_error(doc, format!("HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.download_error(doc, e.to_string()))?;

        if self.verify_content_hash {
            verify_hash(&doc.content_hash, &bytes)?;
        }

        tokio::fs::create_dir_all(&self.docs_dir).await?;
        let path = self.docs_dir.join(sanitize_file_name(&doc.metadata.file_name));
        tokio::fs::write(&path, &bytes).await?;

        info!(
            "downloaded document {} ({} bytes) to {}",
            doc.document_id,
            bytes.len(),
            path.display()
        );
        Ok(path)
    }

    /// Remove a previously downloaded file. Missing files are not an error.
    pub async fn remove(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("failed to remove {}: {}", path.display(), e);
            }
        }
    }

    fn download_error(&self, doc: &DocumentRef, reason: String) -> WorkerError {
        WorkerError::Download {
            document_id: doc.document_id.clone(),
            reason,
        }
    }
}

/// Compare the payload's SHA-256 against the declared content hash.
fn verify_hash(expected: &str, bytes: &[u8]) -> Result<()> {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let actual = hex::encode(hasher.finalize());

    if !actual.eq_ignore_ascii_case(expected) {
        return Err(WorkerError::HashMismatch {
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

/// Restrict a declared file name to a safe basename inside the docs dir.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let sanitized: String = base
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' '))
        .collect();

    let sanitized = sanitized
        .trim_matches(|c: char| c == '.' || c == ' ')
        .to_string();
    if sanitized.is_empty() {
        "document".to_string()
    } else {
        sanitized
    }
}
