//! Detector configuration.
//!
//! Every heuristic threshold used by the pipeline lives here. A `DetectorConfig` is built
//! once (from `Default` or a JSON file), then handed to the detector and never mutated.
//! All sections use `#[serde(default)]`, so a JSON file only needs the keys it overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ir::ElementType;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub preprocess: PreprocessConfig,
    pub proposals: ProposalConfig,
    pub dedup: DedupConfig,
    pub fallback: FallbackConfig,
    pub classifier: ClassifierConfig,
    pub visual: VisualConfig,
    pub ocr: OcrConfig,
    pub labels: LabelConfig,
    pub grid: GridConfig,
    pub layout: LayoutConfig,
}

impl DetectorConfig {
    /// Load a (possibly partial) configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid detector config in {}", path.display()))
    }

    pub fn with_strategy(mut self, strategy: ClassifierStrategy) -> Self {
        self.classifier.strategy = strategy;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Longest side allowed before the image is downscaled.
    pub resize_max_side_px: u32,
    /// Bilateral filter neighbourhood diameter.
    pub bilateral_diameter: u32,
    pub bilateral_sigma_color: f32,
    pub bilateral_sigma_space: f32,
    pub deskew: bool,
    /// Pixels darker than this count as ink when estimating skew.
    pub deskew_ink_threshold: u8,
    /// Side of the square neighbourhood used by the adaptive threshold (odd).
    pub threshold_block_size: u32,
    /// Offset subtracted from the local mean.
    pub threshold_offset: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            resize_max_side_px: 2048,
            bilateral_diameter: 9,
            bilateral_sigma_color: 75.0,
            bilateral_sigma_space: 75.0,
            deskew: false,
            deskew_ink_threshold: 250,
            threshold_block_size: 31,
            threshold_offset: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProposalConfig {
    pub contour_min_area: u32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Dilation radius applied to the edge map (1 = 3x3 kernel).
    pub edge_dilation: u8,
    pub edge_min_area: u32,
    pub edge_min_width: u32,
    pub edge_min_height: u32,
    pub color_segmentation: bool,
    pub color_bands: Vec<HueBand>,
    pub color_min_saturation: u8,
    pub color_min_value: u8,
    pub color_min_area: u32,
}

impl Default for ProposalConfig {
    fn default() -> Self {
        Self {
            contour_min_area: 400,
            canny_low: 50.0,
            canny_high: 150.0,
            edge_dilation: 1,
            edge_min_area: 500,
            edge_min_width: 20,
            edge_min_height: 15,
            color_segmentation: true,
            color_bands: vec![
                HueBand {
                    name: "green".to_string(),
                    hue_min: 40,
                    hue_max: 80,
                },
                HueBand {
                    name: "blue".to_string(),
                    hue_min: 100,
                    hue_max: 130,
                },
            ],
            color_min_saturation: 30,
            color_min_value: 30,
            color_min_area: 200,
        }
    }
}

/// Inclusive hue range on the 0..180 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HueBand {
    pub name: String,
    pub hue_min: u8,
    pub hue_max: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// A candidate covered by an accepted box beyond this fraction of its own area is dropped.
    pub max_overlap_ratio: f32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            max_overlap_ratio: 0.7,
        }
    }
}

/// What to do when neither region proposal nor the coarse threshold found anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    /// Synthesize generic placeholder regions so the IR is never empty.
    Placeholder,
    /// Return no elements and flag the document.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Luma at or below which a pixel counts as content in the coarse pass.
    pub coarse_threshold: u8,
    pub coarse_min_area: u32,
    pub mode: FallbackMode,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            coarse_threshold: 240,
            coarse_min_area: 100,
            mode: FallbackMode::Placeholder,
        }
    }
}

/// Which classification ladder to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierStrategy {
    /// Geometry only.
    Baseline,
    /// Geometry refined by palette and per-region visual features.
    #[default]
    Enhanced,
}

impl ClassifierStrategy {
    pub fn title(&self) -> &'static str {
        match self {
            ClassifierStrategy::Baseline => "auto",
            ClassifierStrategy::Enhanced => "auto_enhanced",
        }
    }
}

/// Closed numeric interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f32) -> bool {
        self.min <= value && value <= self.max
    }
}

/// One rung of the geometric classification ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum GeometricRule {
    /// Matches anything at least this large.
    MinArea { kind: ElementType, min_area: f32 },
    /// Matches a bounded aspect ratio and height with a minimum width.
    Shape {
        kind: ElementType,
        aspect: Range,
        height: Range,
        min_width: f32,
    },
    /// Matches a bounded aspect ratio and shorter side.
    Compact {
        kind: ElementType,
        aspect: Range,
        min_side: Range,
    },
    /// Matches wide, short boxes.
    Wide {
        kind: ElementType,
        min_aspect: f32,
        max_height: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub strategy: ClassifierStrategy,
    /// Evaluated in order; the first matching rule decides the type.
    pub ladder: Vec<GeometricRule>,
    /// Type given to boxes no rule matched.
    pub default_kind: ElementType,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            strategy: ClassifierStrategy::Enhanced,
            ladder: vec![
                GeometricRule::MinArea {
                    kind: ElementType::Container,
                    min_area: 10_000.0,
                },
                GeometricRule::Shape {
                    kind: ElementType::Input,
                    aspect: Range::new(1.5, 15.0),
                    height: Range::new(20.0, 100.0),
                    min_width: 60.0,
                },
                GeometricRule::Shape {
                    kind: ElementType::Button,
                    aspect: Range::new(1.0, 10.0),
                    height: Range::new(20.0, 120.0),
                    min_width: 40.0,
                },
                GeometricRule::Compact {
                    kind: ElementType::Image,
                    aspect: Range::new(0.3, 3.0),
                    min_side: Range::new(20.0, 300.0),
                },
                GeometricRule::Wide {
                    kind: ElementType::Text,
                    min_aspect: 1.5,
                    max_height: 80.0,
                },
            ],
            default_kind: ElementType::Container,
        }
    }
}

/// Shape window used by the visual reclassification rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisualShape {
    pub aspect: Range,
    pub height: Range,
    pub min_area: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    pub button: VisualShape,
    pub button_min_fill: f32,
    pub input: VisualShape,
    pub image_aspect: Range,
    pub image_min_side: Range,
    pub image_area: Range,
    /// Containers must be strictly larger than this.
    pub container_min_area: f32,
    /// Fallback: smaller than this is text.
    pub text_max_area: f32,
    /// Fallback: wider than this is text.
    pub text_min_aspect: f32,
    /// Summed per-channel difference from the background that counts as a distinct color.
    pub distinct_color_delta: u32,
    pub border_max_variance: f32,
    pub uniform_max_variance: f32,
    /// Luma at or below which a pixel counts as filled.
    pub fill_luma_threshold: u8,
    /// Confidence recorded when reclassification changes an element's type.
    pub classification_confidence: f32,
    pub palette_size: usize,
    pub palette_sample_limit: usize,
    pub palette_exported: usize,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            button: VisualShape {
                aspect: Range::new(1.0, 10.0),
                height: Range::new(20.0, 120.0),
                min_area: 400.0,
            },
            button_min_fill: 0.3,
            input: VisualShape {
                aspect: Range::new(1.5, 20.0),
                height: Range::new(20.0, 100.0),
                min_area: 600.0,
            },
            image_aspect: Range::new(0.5, 2.0),
            image_min_side: Range::new(50.0, 200.0),
            image_area: Range::new(2_500.0, 40_000.0),
            container_min_area: 5_000.0,
            text_max_area: 1_000.0,
            text_min_aspect: 5.0,
            distinct_color_delta: 30,
            border_max_variance: 100.0,
            uniform_max_variance: 200.0,
            fill_luma_threshold: 240,
            classification_confidence: 0.8,
            palette_size: 5,
            palette_sample_limit: 10_000,
            palette_exported: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub enabled: bool,
    pub min_text_chars: usize,
    pub min_confidence: f32,
    /// Texts at least this long are trusted down to `long_text_min_confidence`.
    pub long_text_chars: usize,
    pub long_text_min_confidence: f32,
    pub min_box_area: f32,
    /// Second-pass lines starting within this distance of a first-pass line are duplicates.
    pub duplicate_position_tolerance: f32,
    /// An OCR line attaches to an element covering more than this fraction of the line box.
    pub fusion_overlap_ratio: f32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_text_chars: 2,
            min_confidence: 0.4,
            long_text_chars: 5,
            long_text_min_confidence: 0.2,
            min_box_area: 50.0,
            duplicate_position_tolerance: 20.0,
            fusion_overlap_ratio: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    pub min_horizontal_overlap_ratio: f32,
    /// Maximum label-to-input gap as a fraction of the input's height.
    pub max_vertical_gap_ratio: f32,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            min_horizontal_overlap_ratio: 0.4,
            max_vertical_gap_ratio: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub name: String,
    pub columns: u32,
    pub container_width: f32,
    pub margin: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            name: "12-col".to_string(),
            columns: 12,
            container_width: 480.0,
            margin: 24.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub alignment_tolerance: f32,
    pub spacing_tolerance: f32,
    pub grid_min_elements: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            alignment_tolerance: 10.0,
            spacing_tolerance: 5.0,
            grid_min_elements: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: DetectorConfig =
            serde_json::from_str(r#"{"grid": {"columns": 8}, "classifier": {"strategy": "baseline"}}"#)
                .unwrap();
        assert_eq!(cfg.grid.columns, 8);
        assert_eq!(cfg.grid.margin, 24.0);
        assert_eq!(cfg.classifier.strategy, ClassifierStrategy::Baseline);
        assert_eq!(cfg.classifier.ladder.len(), 5);
    }
}
