//! Batch drivers for the two stages.
//!
//! Both stages walk the training set one image at a time; per-image working
//! state (feature maps, patch matrices, kernel banks) lives only inside the
//! loop body, so peak memory is one image's working set. Configuration
//! problems (bad layer number, broken architecture) abort immediately;
//! per-image failures follow the configured [`Strictness`].

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::arch::Arch;
use crate::encoder::encode_layer;
use crate::error::Result;
use crate::estimator::estimate_kernel_bank;
use crate::fileset::{basename, files_with_suffix};
use crate::geometry::scale_factors;
use crate::markers::{read_labeled_points, ReadMode};
use crate::store::{LayerRepo, ModelStore, FEATURE_MAP_EXT};

/// Suffix of feature-point files inside the marker folder.
pub const MARKER_SUFFIX: &str = "-fpts.txt";

/// How the batch reacts to a per-image failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    /// Abort the whole batch on the first failing image.
    Strict,
    /// Log the failure and continue with the remaining images.
    BestEffort,
}

/// Batch-wide settings shared by both stages.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Root folder holding the `layer<N>/` feature-map folders.
    pub layers_root: PathBuf,
    pub strictness: Strictness,
}

impl Default for BatchOptions {
    fn default() -> Self {
        BatchOptions {
            layers_root: PathBuf::from("."),
            strictness: Strictness::BestEffort,
        }
    }
}

fn handle_image_failure(
    strictness: Strictness,
    base: &str,
    layer: usize,
    err: crate::FlimError,
) -> Result<()> {
    match strictness {
        Strictness::Strict => Err(err),
        Strictness::BestEffort => {
            warn!("skipping {} at layer {}: {}", base, layer, err);
            Ok(())
        }
    }
}

/// Estimates one kernel bank per training image from its feature points.
///
/// For every `<base>-fpts.txt` in `markers_dir`, reads the image's layer
/// `layer - 1` feature map, relocates the markers with the scale between the
/// network input and that map, and persists kernels, bias and polarity
/// weights to the model store. Returns the number of images that produced a
/// bank.
pub fn create_layer_models(
    markers_dir: impl AsRef<Path>,
    arch: &Arch,
    layer: usize,
    store: &ModelStore,
    opts: &BatchOptions,
) -> Result<usize> {
    let spec = arch.layer(layer)?;
    let repo = LayerRepo::new(&opts.layers_root);
    let files = files_with_suffix(markers_dir.as_ref(), MARKER_SUFFIX)?;

    let mut done = 0;
    for path in &files {
        let base = basename(path, MARKER_SUFFIX);
        let result: Result<()> = (|| {
            let mimg = repo.get(&base, layer - 1)?;
            let markers =
                read_labeled_points(path, ReadMode::for_image_3d(mimg.is_3d()))?;
            let input = repo.get(&base, 0)?;
            let scale = scale_factors(input.dims(), mimg.dims());
            drop(input);

            let bank = estimate_kernel_bank(&mimg, &markers, spec, scale, arch.stdev_factor);
            store.save(&base, layer, &bank)?;
            info!(
                "{}: estimated {} kernels for layer {}",
                base,
                bank.nkernels(),
                layer
            );
            Ok(())
        })();
        match result {
            Ok(()) => done += 1,
            Err(err) => handle_image_failure(opts.strictness, &base, layer, err)?,
        }
    }
    Ok(done)
}

/// Encodes layer `layer` for every image of layer `layer - 1` that has a
/// persisted kernel bank.
///
/// Images without a kernels artifact are skipped silently (logged only):
/// each image carries its own model, and absence means "do not advance this
/// image". Returns the number of feature maps written.
pub fn encode_layer_batch(
    arch: &Arch,
    layer: usize,
    store: &ModelStore,
    opts: &BatchOptions,
) -> Result<usize> {
    let spec = arch.layer(layer)?;
    let repo = LayerRepo::new(&opts.layers_root);
    let files = repo.list(layer - 1)?;

    let mut done = 0;
    for path in &files {
        let base = basename(path, &format!(".{}", FEATURE_MAP_EXT));
        let result: Result<bool> = (|| {
            let model = match store.load(&base, layer)? {
                Some(model) => model,
                None => {
                    info!("{}: no kernel bank for layer {}, not advanced", base, layer);
                    return Ok(false);
                }
            };
            let (kernels, bias) = model;
            let mimg = repo.get(&base, layer - 1)?;
            let out = encode_layer(&mimg, spec, &kernels, &bias)?;
            repo.put(&base, layer, &out)?;
            info!(
                "{}: encoded layer {} with {} bands",
                base,
                layer,
                out.nbands()
            );
            Ok(true)
        })();
        match result {
            Ok(true) => done += 1,
            Ok(false) => {}
            Err(err) => handle_image_failure(opts.strictness, &base, layer, err)?,
        }
    }
    Ok(done)
}
