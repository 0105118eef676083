//! Patch-sample dataset and normalization primitives.
//!
//! Kernel estimation gathers one flattened patch per marker into a
//! sample-by-feature matrix, z-scores the whole sample population (with a
//! configurable stdev inflation factor) and unit-normalizes each sample.
//! The z-score statistics are kept so the estimator can fold the
//! normalization into kernel weights and biases.

use ndarray::{Array1, Array2, ArrayViewMut1};
use num_traits::Float;

use crate::ImagePrecision;

/// Patch samples of one training image, one row per marker, tagged with the
/// originating marker id and class label (true labels run 1..c).
#[derive(Debug, Clone)]
pub struct PatchDataset {
    pub feats: Array2<ImagePrecision>,
    pub ids: Vec<i32>,
    pub truelabels: Vec<i32>,
    /// Highest true label seen in the sample set.
    pub nclasses: i32,
}

impl PatchDataset {
    pub fn nsamples(&self) -> usize {
        self.feats.nrows()
    }

    pub fn nfeats(&self) -> usize {
        self.feats.ncols()
    }
}

/// Per-feature mean and (inflated) standard deviation of a sample
/// population.
#[derive(Debug, Clone)]
pub struct FeatureStats<F> {
    pub mean: Array1<F>,
    pub stdev: Array1<F>,
}

/// Z-score normalization over the whole sample population, in place.
///
/// Statistics are computed per feature over all samples (population
/// variance); `stdev_factor` is added to every standard deviation so that
/// near-constant features cannot blow up the rescaled values. Features whose
/// inflated stdev is still not positive are set to zero instead of divided,
/// so degenerate inputs never produce NaN.
pub fn zscore_normalize_in_place<F: Float>(
    feats: &mut Array2<F>,
    stdev_factor: F,
) -> FeatureStats<F> {
    let (n, nfeats) = feats.dim();
    let mut mean = Array1::from_elem(nfeats, F::zero());
    let mut stdev = Array1::from_elem(nfeats, stdev_factor);
    if n == 0 {
        return FeatureStats { mean, stdev };
    }
    let nf = F::from(n).unwrap();

    for row in feats.rows() {
        for (j, &x) in row.iter().enumerate() {
            mean[j] = mean[j] + x;
        }
    }
    for m in mean.iter_mut() {
        *m = *m / nf;
    }
    let mut var = Array1::from_elem(nfeats, F::zero());
    for row in feats.rows() {
        for (j, &x) in row.iter().enumerate() {
            let d = x - mean[j];
            var[j] = var[j] + d * d;
        }
    }
    for (j, s) in stdev.iter_mut().enumerate() {
        *s = (var[j] / nf).sqrt() + stdev_factor;
    }

    for mut row in feats.rows_mut() {
        for (j, x) in row.iter_mut().enumerate() {
            *x = if stdev[j] > F::zero() {
                (*x - mean[j]) / stdev[j]
            } else {
                F::zero()
            };
        }
    }
    FeatureStats { mean, stdev }
}

/// Rescales a feature vector to unit Euclidean length; the zero vector is
/// left untouched.
pub fn unit_norm_in_place<F: Float>(mut v: ArrayViewMut1<F>) {
    let mut sq = F::zero();
    for &x in v.iter() {
        sq = sq + x * x;
    }
    let norm = sq.sqrt();
    if norm > F::zero() {
        for x in v.iter_mut() {
            *x = *x / norm;
        }
    }
}
