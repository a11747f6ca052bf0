use clap::{Parser, ValueEnum};
use image::ImageReader;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use shot2ir::{ClassifierStrategy, Detector, DetectorConfig, NoopRecognizer, OcrsRecognizer, StageRecord};

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    Baseline,
    Enhanced,
}

#[derive(Parser)]
#[command(name = "shot2ir")]
#[command(about = "Turn a UI screenshot into a JSON description of its elements")]
struct Cli {
    /// Path to input image file
    #[arg(value_name = "IMAGE")]
    image_path: PathBuf,

    /// Write the IR here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Detector configuration (JSON, missing keys use defaults)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Classifier strategy, overrides the config file
    #[arg(long, value_enum)]
    strategy: Option<Strategy>,

    /// Skip OCR entirely
    #[arg(long)]
    skip_ocr: bool,

    /// Directory holding text-detection.rten and text-recognition.rten (default: ~/.cache/ocrs)
    #[arg(long, value_name = "DIR")]
    ocr_models: Option<PathBuf>,

    /// Save debug outputs to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => DetectorConfig::from_json_file(path)?,
        None => DetectorConfig::default(),
    };
    if let Some(strategy) = args.strategy {
        config = config.with_strategy(match strategy {
            Strategy::Baseline => ClassifierStrategy::Baseline,
            Strategy::Enhanced => ClassifierStrategy::Enhanced,
        });
    }

    if args.verbose {
        eprintln!("Loading image: {:?}", args.image_path);
    }
    let img = ImageReader::open(&args.image_path)?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))?;
    if args.verbose {
        eprintln!("Image loaded: {}x{}", img.width(), img.height());
    }

    let mut detector = Detector::new(config).with_verbose(args.verbose);
    detector = if args.skip_ocr {
        detector.with_recognizer(Arc::new(NoopRecognizer))
    } else {
        let recognizer = match args.ocr_models {
            Some(dir) => OcrsRecognizer::with_model_dir(dir),
            None => OcrsRecognizer::new()?,
        };
        detector.with_recognizer(Arc::new(recognizer))
    };
    if let Some(dir) = args.debug_out {
        detector = detector.with_debug(dir);
    }

    let mut records: Vec<StageRecord> = Vec::new();
    let ir = detector.detect(&img, &mut records)?;

    if args.verbose {
        for record in &records {
            eprintln!("  {}", serde_json::to_string(record)?);
        }

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for el in &ir.elements {
            *counts.entry(el.kind.as_str()).or_insert(0) += 1;
        }
        let summary: Vec<String> = counts.iter().map(|(kind, n)| format!("{} {}", n, kind)).collect();
        eprintln!("Detected: {}", summary.join(", "));
    }

    match args.out {
        Some(path) => {
            ir.save(&path)?;
            if args.verbose {
                eprintln!("Wrote {} elements to {}", ir.elements.len(), path.display());
            }
        }
        None => println!("{}", ir.to_json_pretty()?),
    }

    Ok(())
}
