//! Kernel and bias estimation from marker-centered patches.
//!
//! One kernel per marker: the patch around the marker's relocated position
//! is z-scored against the whole marker-patch population, unit-normalized,
//! and stored as a column of the kernel matrix. The normalization is then
//! folded into the stored kernel so that, at encode time, a plain dot
//! product between a raw (un-normalized) patch and the kernel plus the bias
//! reproduces the dot product against the normalized patch:
//!
//! ```text
//! sum_j w_j * (x_j - mean_j) / stdev_j  ==  sum_j w'_j * x_j + bias
//! with  w'_j = w_j / stdev_j,  bias = -sum_j mean_j * w'_j
//! ```

use ndarray::{Array1, Array2, ArrayViewMut1};

use crate::arch::LayerSpec;
use crate::dataset::{unit_norm_in_place, zscore_normalize_in_place, FeatureStats, PatchDataset};
use crate::geometry::{marker_voxel, AdjRel};
use crate::markers::Marker;
use crate::mimage::MImage;
use crate::WeightPrecision;

/// Kernel bank of one (image, layer) pair. Columns, biases and polarity
/// weights are positionally aligned, in marker order.
#[derive(Debug, Clone)]
pub struct KernelBank {
    /// Kernel matrix, shape `(nfeats, nkernels)`, one column per marker.
    pub kernels: Array2<WeightPrecision>,
    pub bias: Array1<WeightPrecision>,
    /// +1 for object kernels, -1 for background ones.
    pub weights: Array1<WeightPrecision>,
}

impl KernelBank {
    pub fn nkernels(&self) -> usize {
        self.kernels.ncols()
    }

    pub fn nfeats(&self) -> usize {
        self.kernels.nrows()
    }
}

/// Gathers one flattened patch per marker, in marker order.
///
/// Marker positions are relocated onto the layer grid with the per-axis
/// scale factors. Offsets falling outside the domain contribute zero for
/// every band, so every sample has length `adj.len() * nbands` and no patch
/// is ever rejected.
pub fn extract_marker_patches(
    mimg: &MImage,
    markers: &[Marker],
    adj: &AdjRel,
    scale: [f32; 3],
) -> PatchDataset {
    let m = mimg.nbands();
    let nfeats = adj.len() * m;
    let mut feats = Array2::zeros((markers.len(), nfeats));
    let mut ids = Vec::with_capacity(markers.len());
    let mut truelabels = Vec::with_capacity(markers.len());
    let mut nclasses = 0;

    for (s, marker) in markers.iter().enumerate() {
        ids.push(marker.id);
        let truelabel = marker.label + 1; // true labels vary from 1 to c
        truelabels.push(truelabel);
        if truelabel > nclasses {
            nclasses = truelabel;
        }
        let u = marker_voxel(marker.elem, mimg.dims(), scale);
        let mut j = 0;
        for k in 0..adj.len() {
            let v = adj.neighbor(u, k);
            if mimg.valid_voxel(v) {
                for b in 0..m {
                    feats[[s, j]] = mimg.value(b, v);
                    j += 1;
                }
            } else {
                j += m; // zero padding
            }
        }
    }

    PatchDataset {
        feats,
        ids,
        truelabels,
        nclasses,
    }
}

/// Folds the z-score statistics into a kernel column: each weight is divided
/// by its feature's stdev and stored back, and the returned bias accumulates
/// `-mean * weight'` over the rows. Features with a non-positive stdev keep
/// their weight unchanged.
pub fn fold_normalization_into_kernel(
    mut kernel: ArrayViewMut1<WeightPrecision>,
    stats: &FeatureStats<WeightPrecision>,
) -> WeightPrecision {
    let mut bias = 0.0;
    for (row, w) in kernel.iter_mut().enumerate() {
        if stats.stdev[row] > 0.0 {
            *w /= stats.stdev[row];
        }
        bias -= stats.mean[row] * *w;
    }
    bias
}

/// Estimates the kernel bank of one training image: one kernel, one bias and
/// one polarity weight per marker, all in marker order.
///
/// An empty marker slice yields an empty (zero-column) bank; callers treat
/// empty feature-point files as per-image errors before reaching this point.
pub fn estimate_kernel_bank(
    mimg: &MImage,
    markers: &[Marker],
    spec: &LayerSpec,
    scale: [f32; 3],
    stdev_factor: f32,
) -> KernelBank {
    let adj = AdjRel::for_layer(spec, mimg.is_3d());
    let mut ds = extract_marker_patches(mimg, markers, &adj, scale);
    let stats = zscore_normalize_in_place(&mut ds.feats, stdev_factor);

    let (nkernels, nfeats) = ds.feats.dim();
    let mut kernels = Array2::zeros((nfeats, nkernels));
    let mut bias = Array1::zeros(nkernels);
    let mut weights = Array1::zeros(nkernels);

    for s in 0..nkernels {
        let mut col = kernels.column_mut(s);
        col.assign(&ds.feats.row(s));
        unit_norm_in_place(col.view_mut());
        bias[s] = fold_normalization_into_kernel(col, &stats);
        // Object kernels carry +1, background ones -1.
        weights[s] = if ds.nclasses >= 2 && ds.truelabels[s] == ds.nclasses {
            1.0
        } else {
            -1.0
        };
    }

    KernelBank {
        kernels,
        bias,
        weights,
    }
}
