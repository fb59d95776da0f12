use crate::errors::Result;
use crate::upload::{SegmentResponse, UploadRequest};
use async_trait::async_trait;

/// Server-side segmentation.
///
/// Implementations return the parsed response body even when it carries an
/// `error` field; turning that into a failure is the caller's job.
#[async_trait]
pub trait InferenceEndpoint: Send + Sync {
    async fn segment(&self, request: &UploadRequest) -> Result<SegmentResponse>;
}

/// Retrieval of the image and mask resources the endpoint points at.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

#[async_trait]
impl<T: InferenceEndpoint + ?Sized> InferenceEndpoint for std::sync::Arc<T> {
    async fn segment(&self, request: &UploadRequest) -> Result<SegmentResponse> {
        (**self).segment(request).await
    }
}

#[async_trait]
impl<T: ResourceFetcher + ?Sized> ResourceFetcher for std::sync::Arc<T> {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        (**self).fetch(url).await
    }
}
