use std::path::Path;

use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, ViewerError};
use crate::loader::load_image;
use crate::traits::{InferenceEndpoint, ResourceFetcher};
use crate::viewer::Viewer;

/// Extensions the inference endpoint accepts for uploads.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tiff"];

pub fn is_allowed_file(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Multipart payload for one segmentation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Sent as an empty string when unset; the server then picks its default model.
    pub model_path: String,
}

impl UploadRequest {
    pub fn new(
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        model_path: Option<String>,
    ) -> Result<Self> {
        let file_name = file_name.into();
        if file_name.is_empty() {
            return Err(ViewerError::Configuration {
                message: "empty filename".to_string(),
            });
        }
        if !is_allowed_file(&file_name) {
            return Err(ViewerError::Configuration {
                message: format!("file type not allowed: {}", file_name),
            });
        }
        Ok(Self {
            file_name,
            bytes,
            model_path: model_path.unwrap_or_default().trim().to_string(),
        })
    }

    pub async fn from_path(path: &Path, model_path: Option<String>) -> Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ViewerError::FileSystem {
                path: path.to_path_buf(),
                operation: "read upload".to_string(),
                source: e,
            })?;
        Self::new(file_name, bytes, model_path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskDescriptor {
    pub name: String,
    pub url: String,
}

/// Raw JSON body of the endpoint, before the `error` field is interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub masks: Vec<MaskDescriptor>,
}

/// A successful segmentation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    pub image_url: String,
    pub stdout: String,
    pub stderr: String,
    /// In the order the endpoint listed them; masks are processed in this order.
    pub masks: Vec<MaskDescriptor>,
}

impl SegmentResponse {
    pub fn into_segmentation(self) -> Result<Segmentation> {
        if let Some(message) = self.error {
            return Err(ViewerError::Inference { message });
        }
        let image_url = self.image_url.ok_or_else(|| ViewerError::InvalidResponse {
            reason: "missing image_url".to_string(),
        })?;
        Ok(Segmentation {
            image_url,
            stdout: self.stdout.unwrap_or_default(),
            stderr: self.stderr.unwrap_or_default(),
            masks: self.masks,
        })
    }
}

/// Runs a segmentation request and loads its results into a [`Viewer`].
pub struct UploadController<B> {
    backend: B,
    progress: ProgressBar,
}

impl<B: InferenceEndpoint + ResourceFetcher> UploadController<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Upload, then load the base image and every mask, one after another.
    ///
    /// Failures are written to the viewer's activity log before being
    /// returned. An endpoint error leaves the viewer untouched; a decode
    /// failure part-way through keeps the masks processed so far.
    pub async fn submit(&self, viewer: &mut Viewer, request: &UploadRequest) -> Result<usize> {
        let result = self.run(viewer, request).await;
        if let Err(e) = &result {
            viewer.log_mut().error(format!("Error: {}", e));
        }
        result
    }

    async fn run(&self, viewer: &mut Viewer, request: &UploadRequest) -> Result<usize> {
        viewer
            .log_mut()
            .info("Uploading image and running segmentation...");

        let segmentation = self.backend.segment(request).await?.into_segmentation()?;
        viewer.log_mut().info(format!(
            "Segmentation finished. stdout:\n{}\nstderr:\n{}",
            segmentation.stdout, segmentation.stderr
        ));

        let base = load_image(&self.backend, &segmentation.image_url).await?;
        viewer.set_base_image(base);
        viewer.clear_masks();

        self.progress.set_length(segmentation.masks.len() as u64);
        self.progress.set_position(0);
        match self.load_masks(viewer, &segmentation.masks).await {
            Ok(()) => self.progress.finish(),
            Err(e) => {
                self.progress.abandon();
                return Err(e);
            }
        }

        let count = viewer.masks().len();
        viewer.log_mut().info(format!("Loaded {} mask(s)", count));
        Ok(count)
    }

    async fn load_masks(&self, viewer: &mut Viewer, masks: &[MaskDescriptor]) -> Result<()> {
        for descriptor in masks {
            let source = load_image(&self.backend, &descriptor.url).await?;
            viewer.add_mask(&descriptor.name, &descriptor.url, source)?;
            self.progress.inc(1);
        }
        Ok(())
    }
}
