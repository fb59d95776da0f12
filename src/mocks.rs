use std::collections::HashMap;
use std::io::Cursor;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, RgbaImage};
use parking_lot::Mutex;

use crate::errors::{Result, ViewerError};
use crate::traits::{InferenceEndpoint, ResourceFetcher};
use crate::upload::{MaskDescriptor, SegmentResponse, UploadRequest};

/// In-memory stand-in for the inference server.
///
/// Serves a canned segmentation response and PNG-encoded resources, and
/// records every upload it receives.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    response: SegmentResponse,
    resources: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<UploadRequest>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose endpoint always answers with an `error` field.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: SegmentResponse {
                error: Some(message.into()),
                ..SegmentResponse::default()
            },
            ..Self::default()
        }
    }

    pub fn with_image(mut self, url: impl Into<String>, image: &RgbaImage) -> Result<Self> {
        let url = url.into();
        self.response.image_url = Some(url.clone());
        self.resources.insert(url, encode_png(image)?);
        Ok(self)
    }

    pub fn with_mask(
        mut self,
        name: impl Into<String>,
        url: impl Into<String>,
        mask: &RgbaImage,
    ) -> Result<Self> {
        let url = url.into();
        self.response.masks.push(MaskDescriptor {
            name: name.into(),
            url: url.clone(),
        });
        self.resources.insert(url, encode_png(mask)?);
        Ok(self)
    }

    /// Register raw bytes under `url` without listing them in the response.
    pub fn with_resource(mut self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.resources.insert(url.into(), bytes);
        self
    }

    /// List a mask in the response without necessarily serving it.
    pub fn with_descriptor(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.response.masks.push(MaskDescriptor {
            name: name.into(),
            url: url.into(),
        });
        self
    }

    pub fn requests(&self) -> Vec<UploadRequest> {
        self.requests.lock().clone()
    }
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

#[async_trait]
impl InferenceEndpoint for InMemoryBackend {
    async fn segment(&self, request: &UploadRequest) -> Result<SegmentResponse> {
        self.requests.lock().push(request.clone());
        Ok(self.response.clone())
    }
}

#[async_trait]
impl ResourceFetcher for InMemoryBackend {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.resources
            .get(url)
            .cloned()
            .ok_or_else(|| ViewerError::MissingResource {
                url: url.to_string(),
            })
    }
}
