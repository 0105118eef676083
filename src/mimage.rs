//! Multi-band image container.
//!
//! A feature map is a dense voxel grid where every voxel holds a fixed-length
//! vector of band values. Data lives in an `Array4<f32>` with axes
//! `(band, z, y, x)`; 2D images simply have `zsize == 1`. Linear voxel
//! indices run x-fastest (x, then y, then z), and all patch/matrix code in
//! the crate relies on that order.

use std::path::Path;

use ndarray::Array4;
use ndarray_npy::{read_npy, write_npy};

use crate::error::{FlimError, Result};
use crate::ImagePrecision;

/// Multi-band image, immutable after load for a given stage.
#[derive(Debug, Clone)]
pub struct MImage {
    data: Array4<ImagePrecision>,
}

impl MImage {
    /// All-zero image with `m` bands and the given spatial domain.
    pub fn new(m: usize, zsize: usize, ysize: usize, xsize: usize) -> MImage {
        MImage {
            data: Array4::zeros((m, zsize, ysize, xsize)),
        }
    }

    /// Wraps an existing `(band, z, y, x)` array.
    pub fn from_array(data: Array4<ImagePrecision>) -> MImage {
        MImage { data }
    }

    pub fn nbands(&self) -> usize {
        self.data.shape()[0]
    }

    pub fn zsize(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn ysize(&self) -> usize {
        self.data.shape()[2]
    }

    pub fn xsize(&self) -> usize {
        self.data.shape()[3]
    }

    /// Spatial domain as `[xsize, ysize, zsize]`.
    pub fn dims(&self) -> [usize; 3] {
        [self.xsize(), self.ysize(), self.zsize()]
    }

    /// Number of spatial positions.
    pub fn nvoxels(&self) -> usize {
        self.xsize() * self.ysize() * self.zsize()
    }

    pub fn is_3d(&self) -> bool {
        self.zsize() > 1
    }

    /// Decodes a linear voxel index into `[x, y, z]`.
    pub fn voxel_coord(&self, p: usize) -> [i32; 3] {
        crate::geometry::voxel_from_index(p, self.xsize(), self.ysize())
    }

    /// True when the coordinate lies inside the spatial domain.
    pub fn valid_voxel(&self, v: [i32; 3]) -> bool {
        v[0] >= 0
            && (v[0] as usize) < self.xsize()
            && v[1] >= 0
            && (v[1] as usize) < self.ysize()
            && v[2] >= 0
            && (v[2] as usize) < self.zsize()
    }

    /// Band value at a coordinate known to be valid.
    pub fn value(&self, band: usize, v: [i32; 3]) -> ImagePrecision {
        self.data[[band, v[2] as usize, v[1] as usize, v[0] as usize]]
    }

    pub fn value_mut(&mut self, band: usize, v: [i32; 3]) -> &mut ImagePrecision {
        &mut self.data[[band, v[2] as usize, v[1] as usize, v[0] as usize]]
    }

    pub fn data(&self) -> &Array4<ImagePrecision> {
        &self.data
    }

    /// Reads a feature map from a `.npy` file with `(band, z, y, x)` layout.
    pub fn read(path: impl AsRef<Path>) -> Result<MImage> {
        let path = path.as_ref();
        let data: Array4<ImagePrecision> =
            read_npy(path).map_err(|e| FlimError::MatrixRead {
                path: path.to_path_buf(),
                source: e,
            })?;
        Ok(MImage { data })
    }

    /// Writes the feature map as a `.npy` file.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        write_npy(path, &self.data).map_err(|e| FlimError::MatrixWrite {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn coordinate_round_trip() {
        let img = MImage::new(2, 3, 4, 5);
        assert_eq!(img.dims(), [5, 4, 3]);
        assert_eq!(img.nvoxels(), 60);
        assert!(img.is_3d());
        for p in 0..img.nvoxels() {
            let [x, y, z] = img.voxel_coord(p);
            assert!(img.valid_voxel([x, y, z]));
            let back = x as usize + y as usize * 5 + z as usize * 20;
            assert_eq!(back, p);
        }
    }

    #[test]
    fn rejects_out_of_domain_voxels() {
        let img = MImage::new(1, 1, 4, 5);
        assert!(!img.is_3d());
        assert!(img.valid_voxel([0, 0, 0]));
        assert!(img.valid_voxel([4, 3, 0]));
        assert!(!img.valid_voxel([-1, 0, 0]));
        assert!(!img.valid_voxel([5, 0, 0]));
        assert!(!img.valid_voxel([0, 4, 0]));
        assert!(!img.valid_voxel([0, 0, 1]));
    }

    #[test]
    fn npy_round_trip_is_bit_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.npy");
        let data = Array4::from_shape_fn((2, 1, 3, 4), |(b, _, y, x)| {
            0.1 + b as f32 * 7.0 + y as f32 * 0.25 + x as f32 * 1.5
        });
        let img = MImage::from_array(data.clone());
        img.write(&path).unwrap();
        let back = MImage::read(&path).unwrap();
        assert_eq!(back.data(), &data);
    }
}
