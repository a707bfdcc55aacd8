//! Cloud Storage JSON API driver.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use tracing::debug;

use crate::core::{ObjectStore, ObjectUri};
use crate::error::{Result, TransferError};

use super::http::{build_client, check_status, endpoint, transport_error, AccessToken};

/// Default Cloud Storage API root.
pub const DEFAULT_BASE_URL: &str = "https://storage.googleapis.com";

/// Object store backed by Cloud Storage.
#[derive(Debug)]
pub struct GcsObjectStore {
    http: Client,
    token: AccessToken,
    base_url: String,
}

impl GcsObjectStore {
    /// Create a store client.
    pub fn new(
        token: AccessToken,
        base_url: impl Into<String>,
        request_timeout: std::time::Duration,
    ) -> Result<Self> {
        Ok(Self {
            http: build_client(request_timeout)?,
            token,
            base_url: base_url.into(),
        })
    }

    fn bucket_url(&self, bucket: &str) -> Result<Url> {
        endpoint(&self.base_url, &["storage", "v1", "b", bucket])
    }

    fn object_url(&self, uri: &ObjectUri) -> Result<Url> {
        endpoint(
            &self.base_url,
            &["storage", "v1", "b", &uri.bucket, "o", &uri.object],
        )
    }

    /// GET a resource; `Ok(false)` on 404.
    async fn exists(&self, context: &str, url: Url) -> Result<bool> {
        let response = self
            .http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, self.token.bearer())
            .send()
            .await
            .map_err(|e| transport_error(context, e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(context, response).await?;
        Ok(true)
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn object_exists(&self, uri: &ObjectUri) -> Result<bool> {
        self.exists(&format!("objects.get {}", uri), self.object_url(uri)?)
            .await
    }

    async fn delete_object(&self, uri: &ObjectUri) -> Result<()> {
        let context = format!("objects.delete {}", uri);
        let response = self
            .http
            .delete(self.object_url(uri)?)
            .header(reqwest::header::AUTHORIZATION, self.token.bearer())
            .send()
            .await
            .map_err(|e| transport_error(&context, e))?;
        match check_status(&context, response).await {
            Ok(_) => {
                debug!("deleted {}", uri);
                Ok(())
            }
            Err(TransferError::Reference(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        self.exists(&format!("buckets.get {}", bucket), self.bucket_url(bucket)?)
            .await
    }

    fn name(&self) -> &'static str {
        "gcs"
    }
}
