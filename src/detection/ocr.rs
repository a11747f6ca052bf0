use anyhow::{Context, Result};
use image::RgbImage;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams, TextItem};
use rten::Model;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::config::OcrConfig;
use crate::ir::{Element, ElementType};
use crate::models::{BBox, BoxGeometry};

/// How the recognizer should group what it finds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Running text lines
    Block,
    /// Isolated words and labels
    Sparse,
}

/// One recognized piece of text in working-image pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrLine {
    pub text: String,
    pub confidence: f32,
    pub bbox: BBox,
}

impl OcrLine {
    pub fn new(text: impl Into<String>, confidence: f32, bbox: BBox) -> Self {
        Self {
            text: text.into(),
            confidence,
            bbox,
        }
    }
}

/// Anything that can turn an image into text lines.
pub trait TextRecognizer: Send + Sync {
    fn name(&self) -> &str;

    /// Whether a call to `recognize` can succeed at all
    fn is_available(&self) -> bool;

    fn recognize(&self, image: &RgbImage, mode: ScanMode) -> Result<Vec<OcrLine>>;
}

/// Recognizer that never finds anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecognizer;

impl TextRecognizer for NoopRecognizer {
    fn name(&self) -> &str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn recognize(&self, _image: &RgbImage, _mode: ScanMode) -> Result<Vec<OcrLine>> {
        Ok(Vec::new())
    }
}

/// `ocrs` engine whose models are loaded on first use.
pub struct OcrsRecognizer {
    model_dir: PathBuf,
    engine: Mutex<Option<Arc<OcrEngine>>>,
}

/// `ocrs` gives no per-line score.
const OCRS_CONFIDENCE: f32 = 0.9;

impl OcrsRecognizer {
    /// Use the models in `~/.cache/ocrs`, where `ocrs-cli` downloads them.
    pub fn new() -> Result<Self> {
        let home_dir = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"))?;
        Ok(Self::with_model_dir(Path::new(&home_dir).join(".cache/ocrs")))
    }

    pub fn with_model_dir(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            engine: Mutex::new(None),
        }
    }

    fn model_paths(&self) -> (PathBuf, PathBuf) {
        (
            self.model_dir.join("text-detection.rten"),
            self.model_dir.join("text-recognition.rten"),
        )
    }

    fn engine(&self) -> Result<Arc<OcrEngine>> {
        let mut guard = self
            .engine
            .lock()
            .map_err(|_| anyhow::anyhow!("OCR engine lock poisoned"))?;

        if let Some(engine) = guard.as_ref() {
            return Ok(Arc::clone(engine));
        }

        let (detection_path, recognition_path) = self.model_paths();
        if !detection_path.exists() || !recognition_path.exists() {
            anyhow::bail!(
                "OCR models not found. Please run: ocrs-cli --help (or download models manually)\n\
                 Expected locations:\n  - {}\n  - {}",
                detection_path.display(),
                recognition_path.display()
            );
        }

        tracing::debug!("Loading OCR models from {}", self.model_dir.display());
        let detection_model = Model::load_file(&detection_path)
            .with_context(|| format!("Failed to load {}", detection_path.display()))?;
        let recognition_model = Model::load_file(&recognition_path)
            .with_context(|| format!("Failed to load {}", recognition_path.display()))?;

        let engine = Arc::new(OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })?);
        *guard = Some(Arc::clone(&engine));
        Ok(engine)
    }
}

impl TextRecognizer for OcrsRecognizer {
    fn name(&self) -> &str {
        "ocrs"
    }

    fn is_available(&self) -> bool {
        let (detection_path, recognition_path) = self.model_paths();
        detection_path.exists() && recognition_path.exists()
    }

    fn recognize(&self, image: &RgbImage, mode: ScanMode) -> Result<Vec<OcrLine>> {
        let engine = self.engine()?;

        let source = ImageSource::from_bytes(image.as_raw(), image.dimensions())?;
        let input = engine.prepare_input(source)?;
        let words = engine.detect_words(&input)?;

        let groups = match mode {
            ScanMode::Block => engine.find_text_lines(&input, &words),
            ScanMode::Sparse => words.iter().map(|w| vec![w.clone()]).collect(),
        };

        let recognized = engine.recognize_text(&input, &groups)?;

        Ok(recognized
            .into_iter()
            .flatten()
            .map(|line| {
                let r = line.bounding_rect();
                OcrLine::new(
                    line.to_string(),
                    OCRS_CONFIDENCE,
                    [r.left() as f32, r.top() as f32, r.right() as f32, r.bottom() as f32],
                )
            })
            .collect())
    }
}

/// Confidence and size filter. Texts are trimmed; anything left too short, too unsure
/// or too small is dropped.
pub fn filter_lines(lines: Vec<OcrLine>, config: &OcrConfig) -> Vec<OcrLine> {
    lines
        .into_iter()
        .filter_map(|line| {
            let text = line.text.trim();
            let chars = text.chars().count();
            if chars < config.min_text_chars {
                return None;
            }

            let floor = if chars >= config.long_text_chars {
                config.long_text_min_confidence
            } else {
                config.min_confidence
            };
            if line.confidence < floor {
                return None;
            }

            let [x1, y1, x2, y2] = line.bbox;
            if x2 < x1 || y2 < y1 || line.bbox.area() < config.min_box_area {
                return None;
            }

            Some(OcrLine::new(text, line.confidence.clamp(0.0, 1.0), line.bbox))
        })
        .collect()
}

/// Append second-pass lines that repeat neither the text nor the position of a
/// first-pass line.
pub fn merge_passes(first: Vec<OcrLine>, second: Vec<OcrLine>, tolerance: f32) -> Vec<OcrLine> {
    let mut merged = first;
    let first_len = merged.len();

    for line in second {
        let duplicate = merged[..first_len].iter().any(|kept| {
            kept.text.to_lowercase() == line.text.to_lowercase()
                || ((kept.bbox[0] - line.bbox[0]).abs() <= tolerance
                    && (kept.bbox[1] - line.bbox[1]).abs() <= tolerance)
        });
        if !duplicate {
            merged.push(line);
        }
    }

    merged
}

/// Result of running both scans.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub available: bool,
    pub lines: Vec<OcrLine>,
    pub error: Option<String>,
}

/// Run the block scan then the sparse scan and merge them. Never fails: an unavailable
/// engine or a recognition error yields no lines.
pub fn extract_text_lines(
    recognizer: &dyn TextRecognizer,
    image: &RgbImage,
    config: &OcrConfig,
) -> Extraction {
    if !config.enabled || !recognizer.is_available() {
        return Extraction::default();
    }

    let scan = |mode| recognizer.recognize(image, mode).map(|lines| filter_lines(lines, config));

    match scan(ScanMode::Block).and_then(|block| Ok((block, scan(ScanMode::Sparse)?))) {
        Ok((block, sparse)) => Extraction {
            available: true,
            lines: merge_passes(block, sparse, config.duplicate_position_tolerance),
            error: None,
        },
        Err(err) => {
            tracing::warn!("OCR via {} failed: {:#}", recognizer.name(), err);
            Extraction {
                available: false,
                lines: Vec::new(),
                error: Some(format!("{:#}", err)),
            }
        }
    }
}

/// True when every word of `line` already appears in `text`, ignoring case.
fn holds_words(text: Option<&str>, line: &str) -> bool {
    let Some(text) = text else {
        return false;
    };
    let held: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
    line.split_whitespace()
        .all(|word| held.contains(&word.to_lowercase()))
}

/// Merge OCR lines into the element list.
///
/// A line covering more than `overlap_ratio` of its own area with an element gives that
/// element its text, unless the element's text already holds all of the line's words. Other lines become `text_<j>` elements, `j` being the line's index.
/// Running this twice with the same lines leaves the element count unchanged.
pub fn fuse_text_lines(elements: &mut Vec<Element>, lines: &[OcrLine], overlap_ratio: f32) {
    for (j, line) in lines.iter().enumerate() {
        let id = format!("text_{}", j);

        if let Some(existing) = elements.iter_mut().find(|el| el.id == id) {
            existing.text = Some(line.text.clone());
            existing.confidence = Some(line.confidence);
            continue;
        }

        let target = elements
            .iter_mut()
            .find(|el| line.bbox.overlap_ratio(&el.bbox) > overlap_ratio);

        match target {
            Some(el) if holds_words(el.text.as_deref(), &line.text) => {}
            Some(el) => {
                el.text = Some(line.text.clone());
                el.confidence = Some(line.confidence);
            }
            None => {
                elements.push(
                    Element::new(id, ElementType::Text, line.bbox)
                        .with_text(line.text.clone(), line.confidence),
                );
            }
        }
    }
}
