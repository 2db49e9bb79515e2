//! Document conversion behind a strategy trait
//!
//! The worker only needs "file in, Markdown and HTML out". The production
//! implementation delegates to a docling-serve instance over HTTP; tests
//! substitute their own implementations.

use crate::error::{Result, WorkerError};
use async_trait::async_trait;
use reqwest::multipart;
use std::path::Path;
use std::time::Duration;
use serde::Deserialize;
use tracing::{debug, info};

/// Default docling-serve base URL for local instances.
const DEFAULT_DOCLING_SERVE_URL: &str = "http://localhost:5001";

/// Markdown and HTML renderings of one converted document.
#[derive(Debug, Clone)]
pub struct ConvertedDocument {
    pub markdown: String,
    pub html: String,
}

/// Conversion capability the worker delegates to.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Convert the file at `path`. Failures are job-local.
    async fn convert(&self, path: &Path) -> Result<ConvertedDocument>;
}

/// Response body of docling-serve's file conversion endpoint.
#[derive(Debug, Deserialize)]
struct ConvertResponse {
    document: ConvertResponseDocument,
}

#[derive(Debug, Deserialize)]
struct ConvertResponseDocument {
    #[serde(default)]
    md_content: Option<String>,
    #[serde(default)]
    html_content: Option<String>,
}

/// Client for a docling-serve instance.
pub struct DoclingConverter {
    client: reqwest::Client,
    api_base: String,
}

impl DoclingConverter {
    /// Create a converter connecting to a local docling-serve.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_DOCLING_SERVE_URL.to_string())
    }

    /// Create a converter with a custom base URL.
    pub fn with_base_url(api_base: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Read the serve URL from `docling_serve_url`, defaulting to localhost.
    pub fn from_env() -> Self {
        match std::env::var("docling_serve_url") {
            Ok(url) if !url.is_empty() => Self::with_base_url(url),
            _ => Self::new(),
        }
    }
}

impl Default for DoclingConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentConverter for DoclingConverter {
    async fn convert(&self, path: &Path) -> Result<ConvertedDocument> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        debug!("converting {} ({} bytes)", file_name, bytes.len());

        let part = multipart::Part::bytes(bytes).file_name(file_name.clone());
        let form = multipart::Form::new()
            .part("files", part)
            .text("to_formats", "md")
            .text("to_formats", "html");

        let url = format!("{}/v1alpha/convert/file", self.api_base);
        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(300))
            .multipart(form)
            .send()
            .await
            .map_err(|e| WorkerError::Processing(format!("docling-serve request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::Processing(format!(
                "docling-serve error (HTTP {status}): {body}"
            )));
        }

        let body: ConvertResponse = response.json().await.map_err(|e| {
            WorkerError::Processing(format!("invalid docling-serve response: {e}"))
        })?;

        let markdown = body.document.md_content.ok_or_else(|| {
            WorkerError::Processing("docling-serve response has no markdown rendering".to_string())
        })?;
        let html = body.document.html_content.ok_or_else(|| {
            WorkerError::Processing("docling-serve response has no HTML rendering".to_string())
        })?;

        info!("converted {file_name}");
        Ok(ConvertedDocument { markdown, html })
    }
}
