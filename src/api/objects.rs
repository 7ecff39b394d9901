//! Object storage adapter for draft payloads and applicant uploads.
//!
//! Keys are hierarchical strings (`drafts/{token}.json`,
//! `submissions/{token}/...`). The HTTP implementation talks to an
//! S3-compatible gateway; the in-memory implementation backs tests and
//! single-process deployments.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Build a presigned PUT URL the browser can upload to directly.
    fn presign_put(&self, key: &str, content_type: &str, expires_seconds: u64) -> Result<String>;

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()>;

    /// Fetch an object, or `None` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

/// Object store backed by an HTTP object gateway.
#[derive(Debug)]
pub struct HttpObjectStore {
    base_url: String,
    bucket: String,
    client: Client,
}

impl HttpObjectStore {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: String, bucket: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("failed to build object store client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket,
            client,
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.bucket, key)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    fn presign_put(&self, key: &str, content_type: &str, expires_seconds: u64) -> Result<String> {
        if key.is_empty() {
            return Err(anyhow!("object key must not be empty"));
        }
        let mut url = url::Url::parse(&self.object_url(key)).context("invalid object URL")?;
        url.query_pairs_mut()
            .append_pair("X-Content-Type", content_type)
            .append_pair("X-Expires", &expires_seconds.to_string());
        Ok(url.to_string())
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        let response = self
            .client
            .put(self.object_url(key))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .context("object store put request failed")?;
        if !response.status().is_success() {
            return Err(anyhow!("object store put returned {}", response.status()));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let response = self
            .client
            .get(self.object_url(key))
            .send()
            .await
            .context("object store get request failed")?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(anyhow!("object store get returned {}", response.status()));
        }
        let bytes = response
            .bytes()
            .await
            .context("failed to read object body")?;
        Ok(Some(bytes.to_vec()))
    }
}

/// In-memory object store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn presign_put(&self, key: &str, content_type: &str, expires_seconds: u64) -> Result<String> {
        if key.is_empty() {
            return Err(anyhow!("object key must not be empty"));
        }
        Ok(format!(
            "memory:///{key}?X-Content-Type={content_type}&X-Expires={expires_seconds}"
        ))
    }

    async fn put(&self, key: &str, body: Vec<u8>, _content_type: &str) -> Result<()> {
        self.objects.lock().await.insert(key.to_string(), body);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.lock().await.get(key).cloned())
    }
}
