use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};

use crate::errors::{Result, ViewerError};
use crate::traits::{InferenceEndpoint, ResourceFetcher};
use crate::upload::{SegmentResponse, UploadRequest};

/// Talks to the inference endpoint over HTTP.
///
/// Resource URLs in responses are usually server-relative and are resolved
/// against the base URL the backend was created with.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base: Url,
    client: Client,
}

impl HttpBackend {
    pub fn new(server: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ViewerError::Network {
                operation: "http client setup".to_string(),
                source: e,
            })?;
        Self::with_client(server, client)
    }

    /// Use a preconfigured client, e.g. one with custom proxy settings.
    pub fn with_client(server: &str, client: Client) -> Result<Self> {
        let base = Url::parse(server).map_err(|e| ViewerError::Configuration {
            message: format!("invalid server url {}: {}", server, e),
        })?;
        Ok(Self { base, client })
    }

    pub fn resolve(&self, url: &str) -> Result<Url> {
        self.base.join(url).map_err(|e| ViewerError::InvalidResponse {
            reason: format!("cannot resolve {}: {}", url, e),
        })
    }
}

#[async_trait]
impl InferenceEndpoint for HttpBackend {
    async fn segment(&self, request: &UploadRequest) -> Result<SegmentResponse> {
        let endpoint = self.resolve("/segment")?;
        let form = Form::new()
            .part(
                "image",
                Part::bytes(request.bytes.clone()).file_name(request.file_name.clone()),
            )
            .text("model_path", request.model_path.clone());

        log::debug!("POST {} ({} bytes)", endpoint, request.bytes.len());
        let response = self
            .client
            .post(endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ViewerError::Network {
                operation: "upload".to_string(),
                source: e,
            })?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| ViewerError::Network {
            operation: "read segmentation response".to_string(),
            source: e,
        })?;
        log::debug!("segmentation responded with {}", status);

        // Error replies carry their message in the JSON body, whatever the status.
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl ResourceFetcher for HttpBackend {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let resolved = self.resolve(url)?;
        log::debug!("GET {}", resolved);
        let bytes = self
            .client
            .get(resolved)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| ViewerError::Network {
                operation: format!("fetch {}", url),
                source: e,
            })?
            .bytes()
            .await
            .map_err(|e| ViewerError::Network {
                operation: format!("read {}", url),
                source: e,
            })?;
        Ok(bytes.to_vec())
    }
}
