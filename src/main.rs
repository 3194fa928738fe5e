use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use rand::{RngCore, SeedableRng, rngs::SmallRng};
use rand_xoshiro::SplitMix64;

use crate::{
    config::GenConfig,
    handoff::{RecordConversion, Split},
    resources::Resources,
    voc::{ExistingDir, VocWriter},
};

mod config;
mod generator;
mod geom;
mod handoff;
mod record;
mod render;
mod resources;
mod voc;

/// Consecutive skipped attempts tolerated before giving up on a size list
/// no background can satisfy.
const MAX_CONSECUTIVE_SKIPS: u32 = 100;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OnExisting {
    Reuse,
    Delete,
    Abort,
}

impl From<OnExisting> for ExistingDir {
    fn from(v: OnExisting) -> Self {
        match v {
            OnExisting::Reuse => ExistingDir::Reuse,
            OnExisting::Delete => ExistingDir::Delete,
            OnExisting::Abort => ExistingDir::Abort,
        }
    }
}

/// Synthesize a Pascal-VOC text detection dataset from fonts and backgrounds.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Generation configuration (JSON).
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Root directory of the produced VOC dataset.
    #[arg(long)]
    dataset: PathBuf,

    /// Number of samples to generate.
    #[arg(long, default_value_t = 1000)]
    count: u32,

    /// Master seed; omit for a fresh random run.
    #[arg(long)]
    seed: Option<u64>,

    /// Outline every glyph box on the generated images.
    #[arg(long)]
    draw_boxes: bool,

    /// What to do when an output directory already exists.
    #[arg(long, value_enum, default_value_t = OnExisting::Abort)]
    on_existing: OnExisting,

    /// Existing label map to seed id assignment from.
    #[arg(long)]
    label_map: Option<PathBuf>,

    /// Directory holding create_pascal_tf_record.py; enables the record
    /// conversion handoff together with --model-path.
    #[arg(long, requires = "model_path")]
    tool_path: Option<PathBuf>,

    /// Directory receiving the converted .record files and the label map.
    #[arg(long, requires = "tool_path")]
    model_path: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let cfg = GenConfig::from_file(&args.config)?;
    let res = Resources::load(&cfg)?;

    let policy: ExistingDir = args.on_existing.into();
    let mut writer = VocWriter::create(&args.dataset, args.label_map.as_deref(), |path| {
        warn!("{} already exists, applying --on-existing={policy:?}", path.display());
        policy
    })
    .context("dataset directory setup failed")?;

    let master = args.seed.unwrap_or_else(rand::random);
    info!("generating {} samples with master seed {master}", args.count);
    let mut seeds = SplitMix64::seed_from_u64(master);

    let mut made = 0u32;
    let mut skips = 0u32;
    while made < args.count {
        let mut rng = SmallRng::seed_from_u64(seeds.next_u64());
        match generator::compose_sample(&res, &mut rng, args.draw_boxes) {
            Some((img, boxes)) => {
                let name = format!("im{made:04}");
                writer.add_image(&name, &img, &boxes)?;
                made += 1;
                skips = 0;
            }
            None => {
                skips += 1;
                if skips >= MAX_CONSECUTIVE_SKIPS {
                    bail!(
                        "{skips} consecutive attempts skipped, no background fits the \
                         configured sizes"
                    );
                }
            }
        }
    }

    let mut split_rng = SmallRng::seed_from_u64(seeds.next_u64());
    let counts = writer.finish(&mut split_rng)?;
    info!("finished: {} train / {} val samples", counts.train, counts.val);

    if let (Some(tool), Some(model)) = (&args.tool_path, &args.model_path) {
        let conv = RecordConversion::new(tool, &args.dataset, model);
        conv.run(Split::Val)?;
        conv.run(Split::Train)?;
        conv.copy_label_map()?;
    }

    Ok(())
}
