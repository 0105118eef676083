//! Patch geometry and marker coordinate remapping.
//!
//! [`AdjRel`] turns a layer's kernel size and dilation rate into an ordered
//! adjacency template: the relative offsets visited when gathering a patch.
//! Offsets are emitted in raster order (z, then y, then x) and each axis is
//! spaced by its dilation rate, so atrous kernels enlarge the receptive field
//! without adding elements.
//!
//! The scale helpers relocate markers: markers are authored at the network
//! input (base) resolution, while layer `L`'s feature map may be smaller due
//! to pooling strides in earlier layers. A marker's base-resolution linear
//! index is decoded against the scaled-up domain and then floor-divided back
//! onto the layer grid.

use crate::arch::LayerSpec;

/// Ordered list of relative voxel offsets `(dx, dy, dz)` describing a patch
/// shape. Shared read-only across all samples and images of a layer.
#[derive(Debug, Clone)]
pub struct AdjRel {
    offsets: Vec<[i32; 3]>,
}

impl AdjRel {
    /// 2D rectangle of `kx * ky` offsets, each axis dilated.
    pub fn rectangular_with_dilation(kx: usize, ky: usize, dx: usize, dy: usize) -> AdjRel {
        AdjRel::cuboid_with_dilation(kx, ky, 1, dx, dy, 1)
    }

    /// 3D box of `kx * ky * kz` offsets, each axis dilated.
    pub fn cuboid_with_dilation(
        kx: usize,
        ky: usize,
        kz: usize,
        dx: usize,
        dy: usize,
        dz: usize,
    ) -> AdjRel {
        let mut offsets = Vec::with_capacity(kx * ky * kz);
        for iz in 0..kz {
            for iy in 0..ky {
                for ix in 0..kx {
                    offsets.push([
                        (ix as i32 - kx as i32 / 2) * dx as i32,
                        (iy as i32 - ky as i32 / 2) * dy as i32,
                        (iz as i32 - kz as i32 / 2) * dz as i32,
                    ]);
                }
            }
        }
        AdjRel { offsets }
    }

    /// Patch adjacency of a layer: a cuboid for 3D feature maps, a rectangle
    /// otherwise (the z components of the spec are ignored).
    pub fn for_layer(spec: &LayerSpec, is_3d: bool) -> AdjRel {
        if is_3d {
            AdjRel::cuboid_with_dilation(
                spec.kernel_size[0],
                spec.kernel_size[1],
                spec.kernel_size[2],
                spec.dilation_rate[0],
                spec.dilation_rate[1],
                spec.dilation_rate[2],
            )
        } else {
            AdjRel::rectangular_with_dilation(
                spec.kernel_size[0],
                spec.kernel_size[1],
                spec.dilation_rate[0],
                spec.dilation_rate[1],
            )
        }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn offsets(&self) -> &[[i32; 3]] {
        &self.offsets
    }

    /// k-th neighbor of a voxel.
    pub fn neighbor(&self, u: [i32; 3], k: usize) -> [i32; 3] {
        let d = self.offsets[k];
        [u[0] + d[0], u[1] + d[1], u[2] + d[2]]
    }
}

/// Per-axis scale factor between the network input resolution and the
/// current layer's feature-map resolution.
pub fn scale_factors(input_dims: [usize; 3], current_dims: [usize; 3]) -> [f32; 3] {
    [
        input_dims[0] as f32 / current_dims[0] as f32,
        input_dims[1] as f32 / current_dims[1] as f32,
        input_dims[2] as f32 / current_dims[2] as f32,
    ]
}

/// Decodes a 0-based linear voxel index into `[x, y, z]` for a domain with
/// the given x and y extents.
pub fn voxel_from_index(p: usize, xsize: usize, ysize: usize) -> [i32; 3] {
    let z = p / (xsize * ysize);
    let rem = p % (xsize * ysize);
    [(rem % xsize) as i32, (rem / xsize) as i32, z as i32]
}

/// Maps a base-resolution coordinate onto the layer grid by floor division
/// with the per-axis scale factor. Pure, no I/O.
pub fn map_to_layer_grid(base: [i32; 3], scale: [f32; 3]) -> [i32; 3] {
    [
        (base[0] as f32 / scale[0]).floor() as i32,
        (base[1] as f32 / scale[1]).floor() as i32,
        (base[2] as f32 / scale[2]).floor() as i32,
    ]
}

/// Relocates a marker onto the layer grid: its linear index is decoded as if
/// the layer domain were scaled up to the base resolution, then mapped back
/// down axis by axis.
pub fn marker_voxel(elem: usize, layer_dims: [usize; 3], scale: [f32; 3]) -> [i32; 3] {
    let base_x = (layer_dims[0] as f32 * scale[0]) as usize;
    let base_y = (layer_dims[1] as f32 * scale[1]) as usize;
    let base = voxel_from_index(elem, base_x, base_y);
    map_to_layer_grid(base, scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::{LayerSpec, PoolType};

    fn spec(kernel: [usize; 3], dilation: [usize; 3]) -> LayerSpec {
        LayerSpec {
            kernel_size: kernel,
            dilation_rate: dilation,
            relu: false,
            pool_type: PoolType::NoPool,
            pool_size: [1, 1, 1],
            pool_stride: 1,
        }
    }

    #[test]
    fn rectangle_has_raster_order_and_centered_offsets() {
        let a = AdjRel::rectangular_with_dilation(3, 3, 1, 1);
        assert_eq!(a.len(), 9);
        assert_eq!(a.offsets()[0], [-1, -1, 0]);
        assert_eq!(a.offsets()[4], [0, 0, 0]);
        assert_eq!(a.offsets()[8], [1, 1, 0]);
    }

    #[test]
    fn dilation_spaces_offsets_without_adding_elements() {
        let a = AdjRel::rectangular_with_dilation(3, 3, 2, 3);
        assert_eq!(a.len(), 9);
        assert_eq!(a.offsets()[0], [-2, -3, 0]);
        assert_eq!(a.offsets()[8], [2, 3, 0]);
    }

    #[test]
    fn cuboid_covers_all_three_axes() {
        let a = AdjRel::cuboid_with_dilation(3, 3, 3, 1, 1, 2);
        assert_eq!(a.len(), 27);
        assert_eq!(a.offsets()[0], [-1, -1, -2]);
        assert_eq!(a.offsets()[13], [0, 0, 0]);
        assert_eq!(a.offsets()[26], [1, 1, 2]);
    }

    #[test]
    fn layer_adjacency_ignores_z_for_2d_maps() {
        let s = spec([3, 3, 3], [1, 1, 1]);
        assert_eq!(AdjRel::for_layer(&s, false).len(), 9);
        assert_eq!(AdjRel::for_layer(&s, true).len(), 27);
    }

    #[test]
    fn scale_factors_per_axis() {
        let s = scale_factors([480, 360, 1], [240, 120, 1]);
        assert_eq!(s, [2.0, 3.0, 1.0]);
        // Upsampled layers give factors below one.
        let s = scale_factors([100, 100, 1], [200, 200, 1]);
        assert_eq!(s, [0.5, 0.5, 1.0]);
    }

    #[test]
    fn linear_index_decodes_x_fastest() {
        assert_eq!(voxel_from_index(0, 5, 4), [0, 0, 0]);
        assert_eq!(voxel_from_index(7, 5, 4), [2, 1, 0]);
        assert_eq!(voxel_from_index(23, 5, 4), [3, 0, 1]);
    }

    #[test]
    fn marker_relocation_floor_divides() {
        // Layer is 4x4, markers authored at 8x8 (scale 2 per axis).
        let dims = [4usize, 4, 1];
        let scale = [2.0f32, 2.0, 1.0];
        let elem = 5 + 3 * 8; // (5,3) at base resolution
        assert_eq!(marker_voxel(elem, dims, scale), [2, 1, 0]);
        // Identity scale leaves coordinates untouched.
        assert_eq!(marker_voxel(12, [5, 5, 1], [1.0, 1.0, 1.0]), [2, 2, 0]);
    }
}
