//! Persistence of kernel banks and per-layer feature maps.
//!
//! [`ModelStore`] keys every artifact by (model directory, image base name,
//! layer number): the kernel matrix goes to `<base>-conv<L>-kernels.npy`,
//! its bias to `<base>-conv<L>-bias.txt` and the polarity weights to
//! `<base>-conv<L>-weights.txt`. The text files hold a count line followed
//! by space-separated values, serialized losslessly so a save/load round
//! trip is bit-identical.
//!
//! [`LayerRepo`] resolves per-layer feature maps under
//! `<root>/layer<L>/<base>.npy`, keeping the folder convention out of the
//! estimation/encoding logic.

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};
use ndarray_npy::{read_npy, write_npy};

use crate::error::{FlimError, Result};
use crate::estimator::KernelBank;
use crate::fileset::{files_with_suffix, make_dir};
use crate::mimage::MImage;
use crate::WeightPrecision;

/// File extension of persisted feature maps.
pub const FEATURE_MAP_EXT: &str = "npy";

/// Stores and loads kernel banks under one model directory.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    /// Opens a model directory, creating it if missing.
    pub fn new(dir: impl Into<PathBuf>) -> Result<ModelStore> {
        let dir = dir.into();
        make_dir(&dir)?;
        Ok(ModelStore { dir })
    }

    pub fn kernels_path(&self, base: &str, layer: usize) -> PathBuf {
        self.dir.join(format!("{}-conv{}-kernels.npy", base, layer))
    }

    fn bias_path(&self, base: &str, layer: usize) -> PathBuf {
        self.dir.join(format!("{}-conv{}-bias.txt", base, layer))
    }

    fn weights_path(&self, base: &str, layer: usize) -> PathBuf {
        self.dir.join(format!("{}-conv{}-weights.txt", base, layer))
    }

    /// Saves kernels, bias and polarity weights for one (image, layer) key.
    pub fn save(&self, base: &str, layer: usize, bank: &KernelBank) -> Result<()> {
        let path = self.kernels_path(base, layer);
        write_npy(&path, &bank.kernels).map_err(|e| FlimError::MatrixWrite { path, source: e })?;
        write_float_list(&self.bias_path(base, layer), &bank.bias)?;
        write_float_list(&self.weights_path(base, layer), &bank.weights)?;
        Ok(())
    }

    /// Loads the kernel matrix and bias of one (image, layer) key.
    ///
    /// Returns `Ok(None)` when the kernels artifact does not exist: at encode
    /// time this means "no model for this image, skip it". A present kernels
    /// file with a broken sibling bias is a malformed artifact instead.
    pub fn load(
        &self,
        base: &str,
        layer: usize,
    ) -> Result<Option<(Array2<WeightPrecision>, Array1<WeightPrecision>)>> {
        let kernels_path = self.kernels_path(base, layer);
        if !kernels_path.exists() {
            return Ok(None);
        }
        let kernels: Array2<WeightPrecision> =
            read_npy(&kernels_path).map_err(|e| FlimError::MatrixRead {
                path: kernels_path,
                source: e,
            })?;
        let bias = read_float_list(&self.bias_path(base, layer))?;
        if bias.len() != kernels.ncols() {
            return Err(FlimError::MalformedArtifact {
                path: self.bias_path(base, layer),
                reason: format!(
                    "bias has {} entries for {} kernel columns",
                    bias.len(),
                    kernels.ncols()
                ),
            });
        }
        Ok(Some((kernels, bias)))
    }
}

fn write_float_list(path: &Path, values: &Array1<WeightPrecision>) -> Result<()> {
    let mut text = format!("{}\n", values.len());
    for v in values {
        text.push_str(&format!("{} ", v));
    }
    text.push('\n');
    fs::write(path, text).map_err(|e| FlimError::io(path, e))
}

fn read_float_list(path: &Path) -> Result<Array1<WeightPrecision>> {
    let text = fs::read_to_string(path).map_err(|e| FlimError::io(path, e))?;
    let malformed = |reason: String| FlimError::MalformedArtifact {
        path: path.to_path_buf(),
        reason,
    };
    let mut tokens = text.split_whitespace();
    let count: usize = tokens
        .next()
        .ok_or_else(|| malformed("empty file".to_string()))?
        .parse()
        .map_err(|e| malformed(format!("bad count line: {}", e)))?;
    let values: Vec<WeightPrecision> = tokens
        .map(|t| t.parse::<WeightPrecision>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| malformed(format!("bad float: {}", e)))?;
    if values.len() != count {
        return Err(malformed(format!(
            "count line announces {} values, file holds {}",
            count,
            values.len()
        )));
    }
    Ok(Array1::from_vec(values))
}

/// Resolves per-layer feature maps under `<root>/layer<L>/<base>.npy`.
#[derive(Debug, Clone)]
pub struct LayerRepo {
    root: PathBuf,
}

impl LayerRepo {
    pub fn new(root: impl Into<PathBuf>) -> LayerRepo {
        LayerRepo { root: root.into() }
    }

    pub fn layer_dir(&self, layer: usize) -> PathBuf {
        self.root.join(format!("layer{}", layer))
    }

    pub fn path(&self, base: &str, layer: usize) -> PathBuf {
        self.layer_dir(layer)
            .join(format!("{}.{}", base, FEATURE_MAP_EXT))
    }

    /// Reads the feature map of an image at a layer; a missing file is a
    /// distinct error since the previous layer's output is a precondition.
    pub fn get(&self, base: &str, layer: usize) -> Result<MImage> {
        let path = self.path(base, layer);
        if !path.exists() {
            return Err(FlimError::MissingFeatureMap { path });
        }
        MImage::read(path)
    }

    /// Writes the feature map of an image at a layer, creating the folder.
    pub fn put(&self, base: &str, layer: usize, mimg: &MImage) -> Result<()> {
        make_dir(self.layer_dir(layer))?;
        mimg.write(self.path(base, layer))
    }

    /// Feature-map files present at a layer, sorted by name.
    pub fn list(&self, layer: usize) -> Result<Vec<PathBuf>> {
        files_with_suffix(
            self.layer_dir(layer),
            &format!(".{}", FEATURE_MAP_EXT),
        )
    }
}
