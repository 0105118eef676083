//! Runs one convolutional block: encodes the requested layer for every image
//! of the previous layer that has a persisted kernel bank, writing the
//! resulting feature maps to the next layer folder.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use flim_layers::arch::Arch;
use flim_layers::pipeline::{encode_layer_batch, BatchOptions, Strictness};
use flim_layers::store::ModelStore;

#[derive(Parser)]
#[command(name = "encode_layer")]
#[command(about = "Encode one layer of the feature hierarchy with per-image kernel banks")]
#[command(version)]
struct Cli {
    /// Network architecture description (.json).
    arch: PathBuf,

    /// Layer number to encode (1, 2, 3, ...).
    layer: usize,

    /// Folder with the models.
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

    let done = encode_layer_batch(&arch, cli.layer, &store, &opts)
        .with_context(|| format!("encoding layer {}", cli.layer))?;
    println!("encoded {} feature maps for layer {}", done, cli.layer);
    Ok(())
}
