//! Fetch capability for the discovery walker
//!
//! The walker never talks to a transport directly. `HttpFetcher` does real
//! HTTP via reqwest; `InMemoryFetcher` serves canned documents for tests
//! and offline replays.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use crate::document::{HypermediaDocument, HAL_CONTENT_TYPE, JSON_API_CONTENT_TYPE};
use crate::error::FetchError;

/// Raw document returned by a fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub body: String,
    pub content_type: Option<String>,
}

impl FetchedDocument {
    pub fn new(body: impl Into<String>, content_type: Option<&str>) -> Self {
        Self {
            body: body.into(),
            content_type: content_type.map(str::to_string),
        }
    }
}

impl From<&HypermediaDocument> for FetchedDocument {
    fn from(doc: &HypermediaDocument) -> Self {
        Self {
            body: doc.body().to_string(),
            content_type: Some(doc.content_type().to_string()),
        }
    }
}

/// Retrieves one document by URL
///
/// Implementations must be Send + Sync; the walker issues several fetches
/// of one depth level concurrently.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedDocument, FetchError>;
}

#[async_trait]
impl<F: Fetch + ?Sized> Fetch for Arc<F> {
    async fn fetch(&self, url: &Url) -> Result<FetchedDocument, FetchError> {
        (**self).fetch(url).await
    }
}

/// Serves documents from a map keyed by absolute URL
#[derive(Debug, Default)]
pub struct InMemoryFetcher {
    documents: HashMap<String, Result<FetchedDocument, FetchError>>,
    requests: Mutex<Vec<String>>,
}

impl InMemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` at `url` with `content_type`
    pub fn with_document(mut self, url: &str, body: Value, content_type: &str) -> Self {
        self.documents.insert(
            url.to_string(),
            Ok(FetchedDocument::new(body.to_string(), Some(content_type))),
        );
        self
    }

    pub fn with_hal(self, url: &str, body: Value) -> Self {
        self.with_document(url, body, HAL_CONTENT_TYPE)
    }

    pub fn with_json_api(self, url: &str, body: Value) -> Self {
        self.with_document(url, body, JSON_API_CONTENT_TYPE)
    }

    /// Serve a raw body, possibly without a content type
    pub fn with_raw(mut self, url: &str, body: &str, content_type: Option<&str>) -> Self {
        self.documents
            .insert(url.to_string(), Ok(FetchedDocument::new(body, content_type)));
        self
    }

    /// Make every fetch of `url` fail with `error`
    pub fn with_failure(mut self, url: &str, error: FetchError) -> Self {
        self.documents.insert(url.to_string(), Err(error));
        self
    }

    /// URLs requested so far, in request order
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Fetch for InMemoryFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedDocument, FetchError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        self.documents
            .get(url.as_str())
            .cloned()
            .unwrap_or_else(|| Err(FetchError::NotFound(url.to_string())))
    }
}

/// HTTP fetcher asking for either hypermedia format
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedDocument, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .header(
                ACCEPT,
                format!("{}, {}", HAL_CONTENT_TYPE, JSON_API_CONTENT_TYPE),
            )
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        tracing::trace!(url = %url, bytes = body.len(), "Fetched document");
        Ok(FetchedDocument { body, content_type })
    }
}
