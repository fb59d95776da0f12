use std::path::PathBuf;
use thiserror::Error;

/// Structured error types for the segmentation viewer.
///
/// Each variant carries the context of its failure domain (upload, network,
/// decoding, export, filesystem) so callers can report it without parsing strings.
/// Clicking empty space is not represented here: a hit-test miss is a no-op.
#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Filesystem error: {operation} failed for {path:?}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Network error: {operation} failed")]
    Network {
        operation: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Inference error: {message}")]
    Inference { message: String },

    #[error("Invalid response: {reason}")]
    InvalidResponse { reason: String },

    #[error("Resource not found: {url}")]
    MissingResource { url: String },

    #[error("No base image loaded")]
    NoBaseImage,

    #[error("Decode error: could not load image from {url}")]
    Decode {
        url: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Encode error: could not write image to {path:?}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

pub type Result<T> = std::result::Result<T, ViewerError>;

/// Convert I/O errors to filesystem errors.
///
/// Code that knows the path and operation should build
/// `ViewerError::FileSystem` directly; this is the fallback for `?`.
impl From<std::io::Error> for ViewerError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

/// Convert image crate errors to decode errors.
impl From<image::ImageError> for ViewerError {
    fn from(err: image::ImageError) -> Self {
        Self::Decode {
            url: "unknown".to_string(),
            source: err,
        }
    }
}

impl From<reqwest::Error> for ViewerError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            operation: "http request".to_string(),
            source: err,
        }
    }
}

/// A body that is not the JSON shape the endpoint promises is a protocol
/// violation, not a transport failure.
impl From<serde_json::Error> for ViewerError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse {
            reason: err.to_string(),
        }
    }
}
