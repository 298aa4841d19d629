//! Replays a directory of frames through the game pipeline and writes annotated PNGs.

mod render;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use image::RgbImage;
use redlight_vision::{
    FrameSource, GamePipeline, ImageSequenceSource, Light, PipelineConfig, VisionResult,
};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Frames buffered between the reader task and the processing loop.
const FRAME_QUEUE_CAPACITY: usize = 2;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LightArg {
    Green,
    Red,
}

impl From<LightArg> for Light {
    fn from(light: LightArg) -> Self {
        match light {
            LightArg::Green => Light::Green,
            LightArg::Red => Light::Red,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory of input frames, read in file-name order.
    #[arg(long)]
    input: PathBuf,
    /// Directory for annotated output frames.
    #[arg(long)]
    output: PathBuf,
    /// TOML pipeline configuration. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Light held for the whole replay.
    #[arg(long, value_enum, default_value_t = LightArg::Green)]
    light: LightArg,
    /// Also write the motion mask of every frame.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_toml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config.debug_images |= args.debug;

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let mut source = ImageSequenceSource::open(&args.input)
        .with_context(|| format!("opening {}", args.input.display()))?;
    info!(frames = source.remaining(), input = %args.input.display(), "starting replay");

    let (tx, mut rx) = mpsc::channel::<VisionResult<RgbImage>>(FRAME_QUEUE_CAPACITY);
    let reader = tokio::task::spawn_blocking(move || {
        loop {
            let next = match source.next_frame() {
                Ok(Some(frame)) => Ok(frame),
                Ok(None) => break,
                Err(e) => Err(e),
            };
            let failed = next.is_err();
            if tx.blocking_send(next).is_err() || failed {
                break;
            }
        }
    });

    let mut pipeline = GamePipeline::new(config)?;
    pipeline.set_light(args.light.into());

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut processed = 0u64;
    let mut violations = 0usize;
    let outcome: Result<()> = loop {
        let next = tokio::select! {
            next = rx.recv() => next,
            _ = &mut shutdown => {
                info!("interrupted, stopping replay");
                break Ok(());
            }
        };
        let Some(next) = next else {
            break Ok(());
        };
        let frame = match next.context("reading frame") {
            Ok(frame) => frame,
            Err(e) => break Err(e),
        };
        let report = match pipeline.process_frame(&frame) {
            Ok(report) => report,
            Err(e) => break Err(e.into()),
        };

        let annotated = render::annotate(&frame, &report);
        let frame_path = args.output.join(format!("frame_{:06}.png", report.frame_index));
        if let Err(e) = annotated.save(&frame_path) {
            break Err(e).with_context(|| format!("writing {}", frame_path.display()));
        }
        if let Some(debug) = &report.debug {
            let mask_path = args.output.join(format!("mask_{:06}.png", report.frame_index));
            if let Err(e) = debug.mask.save(&mask_path) {
                break Err(e).with_context(|| format!("writing {}", mask_path.display()));
            }
        }

        processed += 1;
        violations += report.violations.len();
    };

    drop(rx);
    if let Err(e) = reader.await {
        error!("frame reader task failed: {e}");
    }
    outcome?;

    info!(
        processed,
        violations,
        identities = pipeline.roster().len(),
        output = %args.output.display(),
        "replay complete"
    );
    Ok(())
}
