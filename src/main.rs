use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use image::{DynamicImage, Rgba};
use seedcut::grid::load_image;
use seedcut::mask::{self, CompositeSink, FbMaskSink, MaskImageSink, ResultSink};
use seedcut::{Connectivity, SegmentationConfig, SegmentationEngine, Segmenter};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ConnectivityArg {
    Four,
    Eight,
}

impl From<ConnectivityArg> for Connectivity {
    fn from(arg: ConnectivityArg) -> Self {
        match arg {
            ConnectivityArg::Four => Connectivity::Four,
            ConnectivityArg::Eight => Connectivity::Eight,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Image to segment (every channel is used, including alpha)
    image: PathBuf,

    /// Mask with white pixels on known foreground, black elsewhere
    foreground: PathBuf,

    /// Mask with white pixels on known background, black elsewhere
    background: PathBuf,

    /// Where to write the image with its background blanked out
    output: PathBuf,

    /// Histogram bins per channel
    #[arg(long, default_value_t = 20)]
    bins: usize,

    /// Weight of the smoothness term
    #[arg(long, default_value_t = 0.5)]
    lambda: f64,

    /// Neighborhood used for the smoothness term
    #[arg(long, value_enum, default_value_t = ConnectivityArg::Four)]
    connectivity: ConnectivityArg,

    /// Result mask (foreground 0, background 255)
    /// Defaults to resultingMask.png next to OUTPUT
    #[arg(long)]
    mask_output: Option<PathBuf>,

    /// Also write the result as a .fbmask descriptor
    #[arg(long)]
    fbmask_output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("Image: {}", args.image.display());
    tracing::info!("Foreground seeds: {}", args.foreground.display());
    tracing::info!("Background seeds: {}", args.background.display());
    tracing::info!("Output: {}", args.output.display());

    let config = SegmentationConfig::default()
        .with_bins(args.bins)
        .with_lambda(args.lambda)
        .with_connectivity(args.connectivity.into());
    let engine = SegmentationEngine::new(config).context("Invalid segmentation settings")?;

    let (decoded, pixels) = load_image(&args.image)?;
    tracing::info!(
        "Read {}x{} image with {:?} pixels",
        decoded.width(),
        decoded.height(),
        decoded.color()
    );

    let foreground = mask::load_seed_mask(&args.foreground)?;
    let background = mask::load_seed_mask(&args.background)?;

    let start = Instant::now();
    let segmentation = engine
        .segment(&pixels, &foreground, &background)
        .context("Segmentation failed")?;
    tracing::info!(
        "Graph cut finished in {:.1}ms: {} foreground, {} background pixels",
        start.elapsed().as_secs_f64() * 1000.0,
        segmentation.labels.count_foreground(),
        segmentation.labels.count_background()
    );

    let mut sinks = build_sinks(&args);
    write_results(&mut sinks, &decoded, &segmentation.labels)?;

    Ok(())
}

fn build_sinks(args: &Args) -> Vec<Box<dyn ResultSink>> {
    let mask_path = args.mask_output.clone().unwrap_or_else(|| {
        args.output
            .parent()
            .map(|dir| dir.join("resultingMask.png"))
            .unwrap_or_else(|| PathBuf::from("resultingMask.png"))
    });

    let mut sinks: Vec<Box<dyn ResultSink>> = vec![
        Box::new(MaskImageSink::new(mask_path)),
        Box::new(CompositeSink::new(&args.output, Rgba([0, 0, 0, 255]))),
    ];
    if let Some(path) = &args.fbmask_output {
        sinks.push(Box::new(FbMaskSink::new(path)));
    }
    sinks
}

fn write_results(
    sinks: &mut [Box<dyn ResultSink>],
    image: &DynamicImage,
    labels: &seedcut::LabelMap,
) -> Result<()> {
    for sink in sinks.iter_mut() {
        sink.write_result(image, labels)
            .with_context(|| format!("Failed to write {}", sink.destination()))?;
        tracing::info!("Wrote {}", sink.destination());
    }
    Ok(())
}
