pub mod preprocessing;
pub mod contours;
pub mod proposals;
pub mod dedup;
pub mod classify;
pub mod visual;
pub mod ocr;
pub mod layout;
pub mod steps;

use anyhow::Result;
use image::DynamicImage;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::config::{ClassifierStrategy, DetectorConfig};
use crate::error::DetectError;
use crate::ir::{IrDocument, IrMeta, SCHEMA_VERSION};
use crate::models::clamp_bbox;
use crate::pipeline::{LogSink, Pipeline, PipelineData};
use ocr::{NoopRecognizer, TextRecognizer};

/// Screenshot to IR detector.
///
/// Holds configuration and the text recognizer, so one instance can be shared across
/// threads; every `detect` call starts from scratch. A debug directory is consumed by
/// the first call that runs.
pub struct Detector {
    config: Arc<DetectorConfig>,
    recognizer: Arc<dyn TextRecognizer>,
    verbose: bool,
    debug_dir: Mutex<Option<PathBuf>>,
}

impl Detector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config: Arc::new(config),
            recognizer: Arc::new(NoopRecognizer),
            verbose: false,
            debug_dir: Mutex::new(None),
        }
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.recognizer = recognizer;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Save per-step debug images into `dir` on the next `detect` call only. Later calls
    /// run without debug output.
    pub fn with_debug(self, dir: impl Into<PathBuf>) -> Self {
        Self {
            debug_dir: Mutex::new(Some(dir.into())),
            ..self
        }
    }

    /// Run the full pipeline on a decoded image.
    pub fn detect(&self, img: &DynamicImage, sink: &mut dyn LogSink) -> Result<IrDocument> {
        let (width, height) = (img.width(), img.height());
        if width == 0 || height == 0 {
            return Err(DetectError::EmptyImage { width, height }.into());
        }

        let mut pipeline = build_standard_pipeline(&self.config, Arc::clone(&self.recognizer))
            .with_verbose(self.verbose);
        let debug_dir = self
            .debug_dir
            .lock()
            .map_err(|_| anyhow::anyhow!("Debug directory lock poisoned"))?
            .take();
        if let Some(dir) = debug_dir {
            pipeline = pipeline.with_debug(dir)?;
        }

        let data = pipeline.run(img.clone(), sink)?;
        Ok(assemble_ir(data, &self.config))
    }

    /// Decode PNG/JPEG bytes and run the pipeline.
    pub fn detect_bytes(&self, bytes: &[u8], sink: &mut dyn LogSink) -> Result<IrDocument> {
        let img = image::load_from_memory(bytes).map_err(DetectError::Decode)?;
        self.detect(&img, sink)
    }
}

impl Default for Detector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

/// Build the standard detection pipeline from a configuration
pub fn build_standard_pipeline(
    config: &DetectorConfig,
    recognizer: Arc<dyn TextRecognizer>,
) -> Pipeline {
    use steps::*;

    let mut pipeline = Pipeline::new()
        .add_step(Arc::new(PreprocessStep {
            config: config.preprocess.clone(),
        }))
        .add_step(Arc::new(ProposalStep {
            config: config.proposals.clone(),
        }))
        .add_step(Arc::new(DeduplicateStep {
            max_overlap_ratio: config.dedup.max_overlap_ratio,
        }))
        .add_step(Arc::new(FallbackStep {
            config: config.fallback.clone(),
        }))
        .add_step(Arc::new(GeometricClassifyStep {
            config: config.classifier.clone(),
        }))
        .add_step(Arc::new(TextExtractionStep {
            recognizer,
            config: config.ocr.clone(),
        }));

    // Runs after fusion: reclassification looks at recognized text
    if config.classifier.strategy == ClassifierStrategy::Enhanced {
        pipeline = pipeline.add_step(Arc::new(VisualAnalysisStep {
            config: config.visual.clone(),
        }));
    }

    pipeline
        .add_step(Arc::new(LabelAssociationStep {
            config: config.labels.clone(),
        }))
        .add_step(Arc::new(GridSnapStep {
            config: config.grid.clone(),
        }))
        .add_step(Arc::new(LayoutAnalysisStep {
            config: config.layout.clone(),
        }))
}

/// Final state to IR: bboxes clamped into the working image, metadata filled in.
pub fn assemble_ir(data: PipelineData, config: &DetectorConfig) -> IrDocument {
    let (w, h) = (data.width() as f32, data.height() as f32);

    let elements = data
        .elements
        .into_iter()
        .map(|mut el| {
            el.bbox = clamp_bbox(el.bbox, w, h);
            el
        })
        .collect();

    let (theme, colors) = match &data.palette {
        Some(palette) => (
            Some(palette.theme),
            Some(palette.hex_colors(config.visual.palette_exported)),
        ),
        None => (None, None),
    };

    IrDocument {
        meta: IrMeta {
            schema: SCHEMA_VERSION,
            title: config.classifier.strategy.title().to_string(),
            w,
            h,
            grid: config.grid.name.clone(),
            theme,
            colors,
            layout: data.layout,
            fallback: data.fallback,
        },
        elements,
    }
}
