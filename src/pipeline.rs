use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Result;

use crate::detection::layout::LayoutSummary;
use crate::detection::visual::Palette;
use crate::ir::{Element, ElementType, FallbackKind};
use crate::models::Rect;

/// Partial detection state handed from step to step.
///
/// Steps consume the previous state and return the next one; nothing survives between
/// two `Pipeline::run` calls.
#[derive(Clone)]
pub struct PipelineData {
    /// Working color image (after any resize/deskew)
    pub image: Arc<RgbImage>,

    /// Binary mask (white = background)
    pub mask: Option<GrayImage>,

    /// Factor applied to the input's dimensions to get the working image
    pub scale: f32,

    /// Candidate regions, in proposal order
    pub proposals: Vec<Rect>,

    /// Typed elements
    pub elements: Vec<Element>,

    pub palette: Option<Palette>,
    pub layout: Option<LayoutSummary>,
    pub fallback: Option<FallbackKind>,

    /// Stage records emitted by the last step, drained by the pipeline
    pub records: Vec<StageRecord>,
}

impl PipelineData {
    /// Create PipelineData for a full input image
    pub fn from_image(image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image.to_rgb8()),
            mask: None,
            scale: 1.0,
            proposals: Vec::new(),
            elements: Vec::new(),
            palette: None,
            layout: None,
            fallback: None,
            records: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Queue a stage record for the caller's log sink
    pub fn log(&mut self, record: StageRecord) {
        self.records.push(record);
    }

    /// Render the current state for debug output: element boxes if any, else proposal
    /// boxes, else the mask, else the working image.
    pub fn debug_image(&self) -> DynamicImage {
        if !self.elements.is_empty() {
            let mut canvas = (*self.image).clone();
            for el in &self.elements {
                let [x1, y1, x2, y2] = el.bbox;
                draw_box(&mut canvas, x1 as i32, y1 as i32, x2 as i32, y2 as i32, type_color(el.kind));
            }
            return DynamicImage::ImageRgb8(canvas);
        }

        if !self.proposals.is_empty() {
            let mut canvas = (*self.image).clone();
            for r in &self.proposals {
                draw_box(&mut canvas, r.x1 as i32, r.y1 as i32, r.x2 as i32, r.y2 as i32, Rgb([255, 0, 0]));
            }
            return DynamicImage::ImageRgb8(canvas);
        }

        match &self.mask {
            Some(mask) => DynamicImage::ImageLuma8(mask.clone()),
            None => DynamicImage::ImageRgb8((*self.image).clone()),
        }
    }
}

fn draw_box(canvas: &mut RgbImage, x1: i32, y1: i32, x2: i32, y2: i32, color: Rgb<u8>) {
    let w = (x2 - x1).max(1) as u32;
    let h = (y2 - y1).max(1) as u32;
    draw_hollow_rect_mut(canvas, imageproc::rect::Rect::at(x1, y1).of_size(w, h), color);
}

fn type_color(kind: ElementType) -> Rgb<u8> {
    match kind {
        ElementType::Text => Rgb([230, 126, 34]),
        ElementType::Input => Rgb([41, 128, 185]),
        ElementType::Button => Rgb([39, 174, 96]),
        ElementType::Image => Rgb([142, 68, 173]),
        ElementType::Container => Rgb([127, 140, 141]),
    }
}

/// Metadata value types
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Float(f32),
    String(String),
    Int(i64),
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

impl From<f32> for MetadataValue {
    fn from(v: f32) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<usize> for MetadataValue {
    fn from(v: usize) -> Self {
        MetadataValue::Int(v as i64)
    }
}

impl From<u32> for MetadataValue {
    fn from(v: u32) -> Self {
        MetadataValue::Int(v as i64)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::String(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::String(v)
    }
}

/// One diagnostic record: a stage name plus its metrics.
/// Serializes flat, e.g. `{"stage": "contours", "count": 12}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRecord {
    pub stage: String,
    #[serde(flatten)]
    pub metrics: BTreeMap<String, MetadataValue>,
}

impl StageRecord {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            metrics: BTreeMap::new(),
        }
    }

    /// Add metadata
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metrics.insert(key.into(), value.into());
        self
    }

    /// Get metadata as bool
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.metrics.get(key) {
            Some(MetadataValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    /// Get metadata as float
    pub fn get_float(&self, key: &str) -> Option<f32> {
        match self.metrics.get(key) {
            Some(MetadataValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    /// Get metadata as integer
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.metrics.get(key) {
            Some(MetadataValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Get metadata as string
    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.metrics.get(key) {
            Some(MetadataValue::String(v)) => Some(v.as_str()),
            _ => None,
        }
    }
}

/// Caller-supplied destination for stage records. Purely diagnostic.
pub trait LogSink {
    fn append(&mut self, record: StageRecord);
}

impl LogSink for Vec<StageRecord> {
    fn append(&mut self, record: StageRecord) {
        self.push(record);
    }
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
    /// Whether debug mode is enabled
    pub enabled: bool,
}

/// Context available to all pipeline steps
#[derive(Clone, Default)]
pub struct PipelineContext {
    pub verbose: bool,
    pub debug: Option<DebugConfig>,
}

/// Trait that all pipeline steps must implement
pub trait PipelineStep: Send + Sync {
    /// Transform the partial state into the next partial state
    fn process(&self, data: PipelineData, context: &PipelineContext) -> Result<PipelineData>;

    /// Human-readable name for this step (used in verbose output and debug file names)
    fn name(&self) -> &str;
}

/// Composable pipeline builder
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
    context: PipelineContext,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            context: PipelineContext::default(),
        }
    }

    /// Enable verbose output
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.context.verbose = verbose;
        self
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.context.debug = Some(DebugConfig {
            output_dir,
            enabled: true,
        });

        Ok(self)
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Helper method to add a step from a Box (for convenience)
    pub fn add_step_boxed(mut self, step: Box<dyn PipelineStep>) -> Self {
        self.steps.push(Arc::from(step));
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step on an input image, forwarding stage records to `sink`
    pub fn run(&self, input: DynamicImage, sink: &mut dyn LogSink) -> Result<PipelineData> {
        self.run_partial(input, self.steps.len(), sink)
    }

    /// Run the pipeline but stop after `num_steps` steps (useful for debugging)
    pub fn run_partial(
        &self,
        input: DynamicImage,
        num_steps: usize,
        sink: &mut dyn LogSink,
    ) -> Result<PipelineData> {
        self.save_debug(0, "input", &input)?;

        let mut data = PipelineData::from_image(input);

        for (step_idx, step) in self.steps.iter().take(num_steps).enumerate() {
            if self.context.verbose {
                eprintln!(
                    "Running step {}: {} ({} proposals, {} elements)",
                    step_idx + 1,
                    step.name(),
                    data.proposals.len(),
                    data.elements.len()
                );
            }

            data = step.process(data, &self.context)?;

            for record in data.records.drain(..) {
                tracing::debug!(step = step.name(), record = ?record, "stage record");
                sink.append(record);
            }

            if self.debug_enabled() {
                self.save_debug(step_idx + 1, step.name(), &data.debug_image())?;
            }

            if self.context.verbose {
                eprintln!("  → {} proposals, {} elements", data.proposals.len(), data.elements.len());
            }
        }

        Ok(data)
    }

    fn debug_enabled(&self) -> bool {
        self.context.debug.as_ref().is_some_and(|d| d.enabled)
    }

    /// Save one debug image as `NN_step_name.png`
    fn save_debug(&self, index: usize, step_name: &str, img: &DynamicImage) -> Result<()> {
        let Some(debug_config) = &self.context.debug else {
            return Ok(());
        };
        if !debug_config.enabled {
            return Ok(());
        }

        let filename = format!("{:02}_{}.png", index, step_name.to_lowercase().replace(' ', "_"));
        let output_path = debug_config.output_dir.join(&filename);
        img.save(&output_path)
            .map_err(|e| anyhow::anyhow!("Failed to save debug image: {}", e))?;

        if self.context.verbose {
            eprintln!("  Debug: saved {}", filename);
        }

        Ok(())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
