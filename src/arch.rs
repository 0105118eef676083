//! Network architecture description.
//!
//! The architecture is a JSON file with one entry per layer plus a global
//! standard-deviation inflation factor used by the z-score normalization:
//!
//! ```json
//! {
//!   "stdev_factor": 0.01,
//!   "layers": [
//!     { "kernel_size": [3, 3, 1], "dilation_rate": [1, 1, 1],
//!       "relu": true, "pool_type": "max_pool",
//!       "pool_size": [3, 3, 1], "pool_stride": 2 }
//!   ]
//! }
//! ```
//!
//! Layers are numbered from 1 in every user-facing surface (CLI arguments,
//! artifact names, error messages), matching the `layer<N>/` folder
//! convention.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{FlimError, Result};

/// Pooling applied after activation, one of the three legal values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolType {
    NoPool,
    AvgPool,
    MaxPool,
}

/// Geometry and post-processing of one convolutional layer.
#[derive(Debug, Clone)]
pub struct LayerSpec {
    /// Kernel extent per axis (x, y, z); the z extent is ignored for 2D maps.
    pub kernel_size: [usize; 3],
    /// Atrous dilation per axis; 1 means contiguous offsets.
    pub dilation_rate: [usize; 3],
    /// Clamp negative activations to zero after the bias add.
    pub relu: bool,
    pub pool_type: PoolType,
    pub pool_size: [usize; 3],
    pub pool_stride: usize,
}

/// Whole-network architecture: ordered layer specs plus the global
/// z-score stdev inflation factor.
#[derive(Debug, Clone)]
pub struct Arch {
    pub stdev_factor: f32,
    pub layers: Vec<LayerSpec>,
}

#[derive(Deserialize)]
struct RawArch {
    stdev_factor: f32,
    layers: Vec<RawLayer>,
}

#[derive(Deserialize)]
struct RawLayer {
    kernel_size: [usize; 3],
    dilation_rate: [usize; 3],
    relu: bool,
    pool_type: String,
    pool_size: [usize; 3],
    pool_stride: usize,
}

impl Arch {
    /// Reads an architecture file, rejecting unknown pooling types with the
    /// offending layer number.
    pub fn load(path: impl AsRef<Path>) -> Result<Arch> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| FlimError::io(path, e))?;
        let raw: RawArch = serde_json::from_str(&text).map_err(|e| FlimError::ArchParse {
            path: path.to_path_buf(),
            source: e,
        })?;
        Arch::from_raw(raw)
    }

    fn from_raw(raw: RawArch) -> Result<Arch> {
        let mut layers = Vec::with_capacity(raw.layers.len());
        for (i, l) in raw.layers.into_iter().enumerate() {
            let pool_type = match l.pool_type.as_str() {
                "no_pool" => PoolType::NoPool,
                "avg_pool" => PoolType::AvgPool,
                "max_pool" => PoolType::MaxPool,
                other => {
                    return Err(FlimError::InvalidPoolType {
                        layer: i + 1,
                        pool_type: other.to_string(),
                    })
                }
            };
            layers.push(LayerSpec {
                kernel_size: l.kernel_size,
                dilation_rate: l.dilation_rate,
                relu: l.relu,
                pool_type,
                pool_size: l.pool_size,
                pool_stride: l.pool_stride,
            });
        }
        Ok(Arch {
            stdev_factor: raw.stdev_factor,
            layers,
        })
    }

    /// Number of layers described by the architecture.
    pub fn nlayers(&self) -> usize {
        self.layers.len()
    }

    /// Returns the spec of a 1-based layer number.
    pub fn layer(&self, layer: usize) -> Result<&LayerSpec> {
        if layer == 0 || layer > self.layers.len() {
            return Err(FlimError::LayerOutOfRange {
                layer,
                nlayers: self.layers.len(),
            });
        }
        Ok(&self.layers[layer - 1])
    }
}
