//! Layer-wise convolutional feature learning from image markers (FLIM).
//!
//! A user places a few labeled markers (object / background) on training
//! images. For each image this crate turns the local patches around those
//! markers into a convolution kernel bank (one kernel per marker, no
//! backpropagation), derives a per-kernel bias from the patch normalization
//! statistics, and then encodes the image with that bank: convolution as a
//! patch-matrix multiply, bias addition, optional rectification and optional
//! atrous pooling. The output feature map feeds the next layer, so a
//! hierarchy is built one layer per invocation.
//!
//! Example:
//! ```
//! use flim_layers::arch::{LayerSpec, PoolType};
//! use flim_layers::encoder::encode_layer;
//! use flim_layers::estimator::estimate_kernel_bank;
//! use flim_layers::markers::Marker;
//! use flim_layers::mimage::MImage;
//! use ndarray::Array4;
//!
//! // One-band 5x5 image with a single object marker at (2,2).
//! let data = Array4::from_shape_fn((1, 1, 5, 5), |(_, _, y, x)| (x + 2 * y) as f32);
//! let image = MImage::from_array(data);
//! let markers = vec![Marker { elem: 2 + 2 * 5, label: 1, id: 1 }];
//!
//! let spec = LayerSpec {
//!     kernel_size: [3, 3, 1],
//!     dilation_rate: [1, 1, 1],
//!     relu: false,
//!     pool_type: PoolType::NoPool,
//!     pool_size: [1, 1, 1],
//!     pool_stride: 1,
//! };
//!
//! let bank = estimate_kernel_bank(&image, &markers, &spec, [1.0, 1.0, 1.0], 0.001);
//! assert_eq!(bank.kernels.dim(), (9, 1));
//!
//! let next = encode_layer(&image, &spec, &bank.kernels, &bank.bias).unwrap();
//! assert_eq!(next.nbands(), 1);
//! assert_eq!(next.dims(), image.dims());
//! ```

pub mod arch;
pub mod dataset;
pub mod encoder;
pub mod error;
pub mod estimator;
pub mod fileset;
pub mod geometry;
pub mod markers;
pub mod mimage;
pub mod pipeline;
pub mod pooling;
pub mod store;

/// Precision of feature-map band values.
pub type ImagePrecision = f32;
/// Precision of kernel weights and biases.
pub type WeightPrecision = f32;

pub use crate::error::{FlimError, Result};
