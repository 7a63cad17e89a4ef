use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::Parser;
use image::ImageReader;
use log::info;

use nucleiseg::models::frame_from_image;
use nucleiseg::pipeline::labels_to_u16;
use nucleiseg::{LabelImage, Param, ParameterVector, Pipeline, Stack, StackSegmenter};

#[derive(Parser)]
#[command(name = "nucleiseg")]
#[command(about = "Segment nuclei in a stack of intensity frames")]
struct Cli {
    /// Frame images, in frame order
    #[arg(value_name = "FRAME", required = true)]
    frames: Vec<PathBuf>,

    /// JSON array of 9 or 10 segmentation parameters
    #[arg(long, value_name = "FILE")]
    params: Option<PathBuf>,

    /// Override one parameter, e.g. --set threshold=0.3
    #[arg(long = "set", value_name = "NAME=VALUE")]
    overrides: Vec<String>,

    /// Segment only this frame index
    #[arg(long, value_name = "N")]
    frame: Option<usize>,

    /// Spread frames across all cores
    #[arg(long)]
    parallel: bool,

    /// Write one 16-bit label PNG per frame to this directory
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Save every intermediate stage to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Write the effective parameter vector as JSON
    #[arg(long, value_name = "FILE")]
    save_params: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let params = load_params(&args)?;
    info!("parameters: {:?}", params.as_array());

    if let Some(path) = &args.save_params {
        let json = serde_json::to_string_pretty(&params)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    }

    let selected: Vec<PathBuf> = match args.frame {
        Some(n) => vec![
            args.frames
                .get(n)
                .cloned()
                .ok_or_else(|| anyhow!("frame {} out of range ({} frames)", n, args.frames.len()))?,
        ],
        None => args.frames.clone(),
    };

    let mut frames = Vec::with_capacity(selected.len());
    for path in &selected {
        let img = ImageReader::open(path)
            .with_context(|| format!("opening {}", path.display()))?
            .decode()
            .map_err(|e| anyhow!("Failed to decode image {}: {}", path.display(), e))?;
        frames.push(frame_from_image(&img));
    }
    let stack = Stack::new(frames)?;
    let (width, height) = stack.dimensions();
    info!("loaded {} frames of {}x{}", stack.len(), width, height);

    let mut pipeline = Pipeline::standard();
    if let Some(debug_dir) = args.debug_out.clone() {
        pipeline = pipeline.with_debug(debug_dir)?;
    }

    let segmenter = StackSegmenter::new(&stack, params).with_pipeline(pipeline);
    let volume = if args.parallel {
        segmenter.run_parallel(|_, _| {})?
    } else {
        segmenter.run(|done, total| {
            if args.verbose {
                println!("  {done}/{total}");
            }
        })?
    };

    println!("\n=== Segmentation Results ===");
    let first_index = args.frame.unwrap_or(0);
    for (offset, labels) in volume.iter().enumerate() {
        println!("  frame {}: {} objects", first_index + offset, count_objects(labels));
    }

    if let Some(out_dir) = &args.out {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("creating {}", out_dir.display()))?;
        for (offset, labels) in volume.iter().enumerate() {
            let path = out_dir.join(format!("labels_{:04}.png", first_index + offset));
            labels_to_u16(labels)
                .save(&path)
                .map_err(|e| anyhow!("Failed to save labels {}: {}", path.display(), e))?;
        }
        println!("\nLabels written to {}/", out_dir.display());
    }

    Ok(())
}

fn load_params(args: &Cli) -> anyhow::Result<ParameterVector> {
    let mut params = match &args.params {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => ParameterVector::default(),
    };

    for assignment in &args.overrides {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow!("expected NAME=VALUE, got '{}'", assignment))?;
        let param = Param::from_name(name.trim())
            .ok_or_else(|| anyhow!("unknown parameter '{}'", name))?;
        let value: f32 = value
            .trim()
            .parse()
            .with_context(|| format!("parsing value for {}", name))?;
        params.set(param, value)?;
    }

    Ok(params)
}

fn count_objects(labels: &LabelImage) -> usize {
    labels
        .pixels()
        .map(|p| p[0])
        .filter(|&l| l != 0)
        .collect::<BTreeSet<_>>()
        .len()
}
