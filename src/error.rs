//! Crate-wide error type.
//!
//! Configuration problems (bad layer index, unknown pooling type) are fatal
//! for the whole invocation; the remaining variants describe per-image
//! failures that the batch drivers may log and skip, see [`crate::pipeline`].

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlimError {
    #[error("i/o error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse architecture {path:?}: {source}")]
    ArchParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("layer {layer} is out of range: architecture has {nlayers} layers")]
    LayerOutOfRange { layer: usize, nlayers: usize },

    #[error("invalid pooling type {pool_type:?} in layer {layer}")]
    InvalidPoolType { layer: usize, pool_type: String },

    #[error("no markers in feature-point file {path:?}")]
    EmptyMarkerSet { path: PathBuf },

    #[error("malformed feature-point file {path:?}: {reason}")]
    MalformedMarkerFile { path: PathBuf, reason: String },

    #[error("missing feature map {path:?}")]
    MissingFeatureMap { path: PathBuf },

    #[error("failed to read matrix {path:?}: {source}")]
    MatrixRead {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpyError,
    },

    #[error("failed to write matrix {path:?}: {source}")]
    MatrixWrite {
        path: PathBuf,
        #[source]
        source: ndarray_npy::WriteNpyError,
    },

    #[error("malformed model artifact {path:?}: {reason}")]
    MalformedArtifact { path: PathBuf, reason: String },

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
}

impl FlimError {
    /// Wraps an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FlimError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, FlimError>;
