//! Creates one model per training image: one kernel per feature point using
//! the patch shape of the requested layer, one bias per kernel from the
//! marker normalization statistics, and one ±1 weight per kernel (object vs
//! background) for later decoding of the layer's output.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use flim_layers::arch::Arch;
use flim_layers::pipeline::{create_layer_models, BatchOptions, Strictness};
use flim_layers::store::ModelStore;

#[derive(Parser)]
#[command(name = "create_layer_model")]
#[command(about = "Estimate per-image kernel banks from marker feature points")]
#[command(version)]
struct Cli {
    /// Input folder with feature-point files (-fpts.txt).
    markers_dir: PathBuf,

    /// Network architecture description (.json).
    arch: PathBuf,

    /// Layer whose patch geometry drives the estimation (1, 2, 3, ...).
    layer: usize,

    /// Output folder for the models.
    model_dir: PathBuf,

    /// Root folder holding the layer<N> feature-map folders.
    #[arg(long, default_value = ".")]
    layers_root: PathBuf,

    /// Abort the whole batch on the first failing image.
    #[arg(long)]
    strict: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let arch = Arch::load(&cli.arch)
        .with_context(|| format!("loading architecture {}", cli.arch.display()))?;
    let store = ModelStore::new(&cli.model_dir)
        .with_context(|| format!("opening model folder {}", cli.model_dir.display()))?;
    let opts = BatchOptions {
        layers_root: cli.layers_root,
        strictness: if cli.strict {
            Strictness::Strict
        } else {
            Strictness::BestEffort
        },
    };

    let done = create_layer_models(&cli.markers_dir, &arch, cli.layer, &store, &opts)
        .with_context(|| format!("estimating models for layer {}", cli.layer))?;
    println!("estimated kernel banks for {} images", done);
    Ok(())
}
