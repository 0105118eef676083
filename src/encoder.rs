//! Layer encoding: convolution as a patch-matrix multiply.
//!
//! The source feature map is unrolled into a patch-feature matrix (one row
//! per spatial position, zero-padded outside the domain, same feature order
//! as marker-patch extraction), multiplied by the kernel matrix and reshaped
//! back into a multi-band image with one band per kernel. Bias is added at
//! every position; rectification clamps negatives only when the layer asks
//! for it; pooling runs last.

use ndarray::{Array1, Array2};

use crate::arch::{LayerSpec, PoolType};
use crate::error::{FlimError, Result};
use crate::geometry::AdjRel;
use crate::mimage::MImage;
use crate::pooling::{atrous_avg_pool, atrous_max_pool};
use crate::{ImagePrecision, WeightPrecision};

/// Unrolls a feature map into a `(nvoxels, adj.len() * nbands)` matrix.
///
/// Row `p` holds the flattened patch around linear voxel `p`; offsets outside
/// the domain contribute zero for every band, mirroring marker-patch
/// extraction.
pub fn image_to_patch_matrix(mimg: &MImage, adj: &AdjRel) -> Array2<ImagePrecision> {
    let m = mimg.nbands();
    let nfeats = adj.len() * m;
    let mut cols = Array2::zeros((mimg.nvoxels(), nfeats));
    for p in 0..mimg.nvoxels() {
        let u = mimg.voxel_coord(p);
        let mut j = 0;
        for k in 0..adj.len() {
            let v = adj.neighbor(u, k);
            if mimg.valid_voxel(v) {
                for b in 0..m {
                    cols[[p, j]] = mimg.value(b, v);
                    j += 1;
                }
            } else {
                j += m;
            }
        }
    }
    cols
}

/// Encodes one layer for one image: patch-matrix multiply against the kernel
/// bank, bias add, optional rectification, optional atrous pooling.
///
/// The kernel matrix has shape `(nfeats, nkernels)`; the output has one band
/// per kernel and, before pooling, the source's spatial domain.
pub fn encode_layer(
    mimg: &MImage,
    spec: &LayerSpec,
    kernels: &Array2<WeightPrecision>,
    bias: &Array1<WeightPrecision>,
) -> Result<MImage> {
    let adj = AdjRel::for_layer(spec, mimg.is_3d());
    let nfeats = adj.len() * mimg.nbands();
    if kernels.nrows() != nfeats {
        return Err(FlimError::ShapeMismatch(format!(
            "kernel matrix has {} rows, patch features are {} ({} offsets x {} bands)",
            kernels.nrows(),
            nfeats,
            adj.len(),
            mimg.nbands()
        )));
    }
    if bias.len() != kernels.ncols() {
        return Err(FlimError::ShapeMismatch(format!(
            "bias has {} entries for {} kernels",
            bias.len(),
            kernels.ncols()
        )));
    }

    let patches = image_to_patch_matrix(mimg, &adj);
    let activations = patches.dot(kernels); // (nvoxels, nkernels)

    let mut activ = MImage::new(kernels.ncols(), mimg.zsize(), mimg.ysize(), mimg.xsize());
    for p in 0..mimg.nvoxels() {
        let u = mimg.voxel_coord(p);
        for b in 0..kernels.ncols() {
            let mut val = activations[[p, b]] + bias[b];
            if spec.relu && val < 0.0 {
                val = 0.0;
            }
            *activ.value_mut(b, u) = val;
        }
    }

    let out = match spec.pool_type {
        PoolType::NoPool => activ,
        PoolType::AvgPool => atrous_avg_pool(&activ, spec.pool_size, 1, spec.pool_stride),
        PoolType::MaxPool => atrous_max_pool(&activ, spec.pool_size, 1, spec.pool_stride),
    };
    Ok(out)
}
