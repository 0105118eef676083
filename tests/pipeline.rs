//! End-to-end tests of the two-stage pipeline over a temporary layer tree.

use std::fs;
use std::path::Path;

use ndarray::Array4;
use tempfile::TempDir;

use flim_layers::arch::{Arch, LayerSpec, PoolType};
use flim_layers::mimage::MImage;
use flim_layers::pipeline::{
    create_layer_models, encode_layer_batch, BatchOptions, Strictness,
};
use flim_layers::store::{LayerRepo, ModelStore};
use flim_layers::FlimError;

fn test_arch() -> Arch {
    Arch {
        stdev_factor: 0.01,
        layers: vec![LayerSpec {
            kernel_size: [3, 3, 1],
            dilation_rate: [1, 1, 1],
            relu: true,
            pool_type: PoolType::MaxPool,
            pool_size: [3, 3, 1],
            pool_stride: 2,
        }],
    }
}

fn put_layer0_image(root: &Path, base: &str) {
    let repo = LayerRepo::new(root);
    let data = Array4::from_shape_fn((1, 1, 6, 6), |(_, _, y, x)| {
        (x as f32 * 1.5 + y as f32 * 0.5).sin() + x as f32
    });
    repo.put(base, 0, &MImage::from_array(data)).unwrap();
}

fn write_markers(markers_dir: &Path, base: &str, points: &[(usize, usize, i32)]) {
    let mut text = format!("{} 6 6 1\n", points.len());
    for (i, (x, y, label)) in points.iter().enumerate() {
        text.push_str(&format!("{} {} {} {}\n", x, y, label, i + 1));
    }
    fs::write(markers_dir.join(format!("{}-fpts.txt", base)), text).unwrap();
}

fn options(root: &Path, strictness: Strictness) -> BatchOptions {
    BatchOptions {
        layers_root: root.to_path_buf(),
        strictness,
    }
}

#[test]
fn per_image_banks_and_missing_bank_skip() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let markers_dir = root.join("markers");
    fs::create_dir(&markers_dir).unwrap();

    for base in ["img01", "img02", "img03"] {
        put_layer0_image(root, base);
    }
    write_markers(
        &markers_dir,
        "img01",
        &[(1, 1, 1), (2, 2, 0), (3, 3, 1), (4, 4, 0)],
    );
    write_markers(
        &markers_dir,
        "img02",
        &[
            (0, 0, 0),
            (1, 2, 1),
            (2, 1, 1),
            (3, 4, 0),
            (4, 3, 1),
            (5, 5, 0),
            (2, 4, 1),
        ],
    );
    // img03 has no feature points and therefore trains no model.

    let arch = test_arch();
    let store = ModelStore::new(root.join("models")).unwrap();
    let opts = options(root, Strictness::Strict);

    let estimated = create_layer_models(&markers_dir, &arch, 1, &store, &opts).unwrap();
    assert_eq!(estimated, 2);

    // One model per image, with per-image widths and aligned artifacts.
    let (k1, b1) = store.load("img01", 1).unwrap().unwrap();
    assert_eq!(k1.dim(), (9, 4));
    assert_eq!(b1.len(), 4);
    let (k2, b2) = store.load("img02", 1).unwrap().unwrap();
    assert_eq!(k2.dim(), (9, 7));
    assert_eq!(b2.len(), 7);
    assert!(store.load("img03", 1).unwrap().is_none());

    let encoded = encode_layer_batch(&arch, 1, &store, &opts).unwrap();
    assert_eq!(encoded, 2);

    let repo = LayerRepo::new(root);
    let out1 = repo.get("img01", 1).unwrap();
    assert_eq!(out1.nbands(), 4);
    assert_eq!(out1.dims(), [3, 3, 1]); // 6x6 max-pooled with stride 2
    let out2 = repo.get("img02", 1).unwrap();
    assert_eq!(out2.nbands(), 7);

    // The image without a kernel bank is not advanced to layer 1.
    assert!(matches!(
        repo.get("img03", 1),
        Err(FlimError::MissingFeatureMap { .. })
    ));

    // ReLU is on for this layer: every activation survives as >= 0 and max
    // pooling cannot produce negatives.
    for p in 0..out1.nvoxels() {
        let u = out1.voxel_coord(p);
        for b in 0..out1.nbands() {
            assert!(out1.value(b, u) >= 0.0);
        }
    }
}

#[test]
fn estimation_artifacts_are_idempotent() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let markers_dir = root.join("markers");
    fs::create_dir(&markers_dir).unwrap();
    put_layer0_image(root, "img01");
    write_markers(&markers_dir, "img01", &[(2, 2, 1), (4, 1, 0), (1, 4, 0)]);

    let arch = test_arch();
    let store = ModelStore::new(root.join("models")).unwrap();
    let opts = options(root, Strictness::Strict);

    create_layer_models(&markers_dir, &arch, 1, &store, &opts).unwrap();
    let artifacts = [
        "img01-conv1-kernels.npy",
        "img01-conv1-bias.txt",
        "img01-conv1-weights.txt",
    ];
    let first: Vec<Vec<u8>> = artifacts
        .iter()
        .map(|name| fs::read(root.join("models").join(name)).unwrap())
        .collect();

    create_layer_models(&markers_dir, &arch, 1, &store, &opts).unwrap();
    for (name, bytes) in artifacts.iter().zip(&first) {
        assert_eq!(
            &fs::read(root.join("models").join(name)).unwrap(),
            bytes,
            "artifact {} changed between identical runs",
            name
        );
    }
}

#[test]
fn strictness_controls_per_image_failures() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let markers_dir = root.join("markers");
    fs::create_dir(&markers_dir).unwrap();

    put_layer0_image(root, "good");
    write_markers(&markers_dir, "good", &[(2, 2, 1), (3, 3, 0)]);
    // Feature points for an image that has no layer 0 feature map.
    write_markers(&markers_dir, "orphan", &[(1, 1, 1)]);
    // An empty feature-point file is a per-image error too.
    put_layer0_image(root, "empty");
    fs::write(markers_dir.join("empty-fpts.txt"), "0 6 6 1\n").unwrap();

    let arch = test_arch();
    let store = ModelStore::new(root.join("models")).unwrap();

    // Best effort: the failing images are logged and skipped.
    let done = create_layer_models(
        &markers_dir,
        &arch,
        1,
        &store,
        &options(root, Strictness::BestEffort),
    )
    .unwrap();
    assert_eq!(done, 1);
    assert!(store.load("good", 1).unwrap().is_some());
    assert!(store.load("orphan", 1).unwrap().is_none());
    assert!(store.load("empty", 1).unwrap().is_none());

    // Strict: the first failure aborts the batch.
    let err = create_layer_models(
        &markers_dir,
        &arch,
        1,
        &store,
        &options(root, Strictness::Strict),
    )
    .unwrap_err();
    assert!(matches!(err, FlimError::EmptyMarkerSet { .. }));
}

#[test]
fn configuration_errors_abort_before_any_work() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let markers_dir = root.join("markers");
    fs::create_dir(&markers_dir).unwrap();

    let arch = test_arch();
    let store = ModelStore::new(root.join("models")).unwrap();
    let opts = options(root, Strictness::BestEffort);

    assert!(matches!(
        create_layer_models(&markers_dir, &arch, 7, &store, &opts),
        Err(FlimError::LayerOutOfRange { layer: 7, .. })
    ));
    assert!(matches!(
        encode_layer_batch(&arch, 7, &store, &opts),
        Err(FlimError::LayerOutOfRange { layer: 7, .. })
    ));
}
