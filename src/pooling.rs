//! Atrous average and max pooling.
//!
//! The pooling window is an adjacency template built from `pool_size` with
//! offsets spaced by the atrous factor, matching the convolution's dilation
//! semantics. Every voxel is aggregated over its (dilated) window first, and
//! the result is then subsampled by the stride, so the output domain is
//! `ceil(size / stride)` per axis.

use crate::geometry::AdjRel;
use crate::mimage::MImage;

fn pool_adjacency(mimg: &MImage, pool_size: [usize; 3], atrous_factor: usize) -> AdjRel {
    if mimg.is_3d() {
        AdjRel::cuboid_with_dilation(
            pool_size[0],
            pool_size[1],
            pool_size[2],
            atrous_factor,
            atrous_factor,
            atrous_factor,
        )
    } else {
        AdjRel::rectangular_with_dilation(
            pool_size[0],
            pool_size[1],
            atrous_factor,
            atrous_factor,
        )
    }
}

fn subsample(mimg: MImage, stride: usize) -> MImage {
    if stride <= 1 {
        return mimg;
    }
    let ceil_div = |n: usize| (n + stride - 1) / stride;
    let mut out = MImage::new(
        mimg.nbands(),
        ceil_div(mimg.zsize()),
        ceil_div(mimg.ysize()),
        ceil_div(mimg.xsize()),
    );
    for p in 0..out.nvoxels() {
        let u = out.voxel_coord(p);
        let src = [
            u[0] * stride as i32,
            u[1] * stride as i32,
            u[2] * stride as i32,
        ];
        for b in 0..out.nbands() {
            *out.value_mut(b, u) = mimg.value(b, src);
        }
    }
    out
}

/// Window mean with zero padding: sums the valid neighbors and divides by
/// the full window size, then subsamples by `stride`.
pub fn atrous_avg_pool(
    mimg: &MImage,
    pool_size: [usize; 3],
    atrous_factor: usize,
    stride: usize,
) -> MImage {
    let adj = pool_adjacency(mimg, pool_size, atrous_factor);
    let window = adj.len() as f32;
    let mut pooled = MImage::new(mimg.nbands(), mimg.zsize(), mimg.ysize(), mimg.xsize());
    for p in 0..mimg.nvoxels() {
        let u = mimg.voxel_coord(p);
        for b in 0..mimg.nbands() {
            let mut sum = 0.0;
            for k in 0..adj.len() {
                let v = adj.neighbor(u, k);
                if mimg.valid_voxel(v) {
                    sum += mimg.value(b, v);
                }
            }
            *pooled.value_mut(b, u) = sum / window;
        }
    }
    subsample(pooled, stride)
}

/// Window maximum over the valid neighbors, then subsampling by `stride`.
pub fn atrous_max_pool(
    mimg: &MImage,
    pool_size: [usize; 3],
    atrous_factor: usize,
    stride: usize,
) -> MImage {
    let adj = pool_adjacency(mimg, pool_size, atrous_factor);
    let mut pooled = MImage::new(mimg.nbands(), mimg.zsize(), mimg.ysize(), mimg.xsize());
    for p in 0..mimg.nvoxels() {
        let u = mimg.voxel_coord(p);
        for b in 0..mimg.nbands() {
            let mut max = f32::NEG_INFINITY;
            for k in 0..adj.len() {
                let v = adj.neighbor(u, k);
                if mimg.valid_voxel(v) && mimg.value(b, v) > max {
                    max = mimg.value(b, v);
                }
            }
            *pooled.value_mut(b, u) = max;
        }
    }
    subsample(pooled, stride)
}
