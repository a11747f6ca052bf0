use crate::config::{
    ClassifierConfig, FallbackConfig, FallbackMode, GridConfig, LabelConfig, LayoutConfig,
    OcrConfig, PreprocessConfig, ProposalConfig, VisualConfig,
};
use crate::detection::ocr::TextRecognizer;
use crate::detection::{classify, dedup, layout, ocr, preprocessing, proposals, visual};
use crate::ir::FallbackKind;
use crate::pipeline::{PipelineContext, PipelineData, PipelineStep, StageRecord};
use anyhow::{anyhow, Result};
use std::sync::Arc;

/// Resize, denoise, optionally deskew and binarize
pub struct PreprocessStep {
    pub config: PreprocessConfig,
}

impl PipelineStep for PreprocessStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let pre = preprocessing::preprocess(&data.image, &self.config);

        data.log(
            StageRecord::new("resize")
                .with("scale", pre.scale)
                .with("w", pre.image.width())
                .with("h", pre.image.height()),
        );
        data.log(
            StageRecord::new("preprocess")
                .with("deskew", self.config.deskew)
                .with("skew_degrees", pre.skew_degrees),
        );

        data.image = Arc::new(pre.image);
        data.mask = Some(pre.mask);
        data.scale = pre.scale;
        Ok(data)
    }

    fn name(&self) -> &str {
        "Preprocess"
    }
}

/// Contour, edge and color region proposals
pub struct ProposalStep {
    pub config: ProposalConfig,
}

impl PipelineStep for ProposalStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let mask = data
            .mask
            .as_ref()
            .ok_or_else(|| anyhow!("Region proposal needs a binary mask, run preprocessing first"))?;

        let found = proposals::propose(&data.image, mask, &self.config);
        data.log(
            StageRecord::new("contours")
                .with("contour", found.contour.len())
                .with("edge", found.edge.len())
                .with("color", found.color.len()),
        );

        data.proposals = found.union();
        Ok(data)
    }

    fn name(&self) -> &str {
        "Region Proposals"
    }
}

/// Drop proposals mostly covered by an earlier one
pub struct DeduplicateStep {
    pub max_overlap_ratio: f32,
}

impl PipelineStep for DeduplicateStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let before = data.proposals.len();
        data.proposals = dedup::deduplicate(&data.proposals, self.max_overlap_ratio);

        data.log(
            StageRecord::new("dedup")
                .with("before", before)
                .with("after", data.proposals.len()),
        );
        Ok(data)
    }

    fn name(&self) -> &str {
        "Deduplicate"
    }
}

/// Coarse threshold, then placeholders or nothing, when no proposal survived
pub struct FallbackStep {
    pub config: FallbackConfig,
}

impl PipelineStep for FallbackStep {
    fn process(&self, mut data: PipelineData, context: &PipelineContext) -> Result<PipelineData> {
        if !data.proposals.is_empty() {
            return Ok(data);
        }

        let coarse = proposals::coarse_proposals(&data.image, &self.config);
        let (regions, kind) = if !coarse.is_empty() {
            (coarse, FallbackKind::CoarseThreshold)
        } else {
            match self.config.mode {
                FallbackMode::Placeholder => (
                    proposals::placeholder_proposals(data.width(), data.height()),
                    FallbackKind::Placeholder,
                ),
                FallbackMode::Empty => (Vec::new(), FallbackKind::Empty),
            }
        };

        if context.verbose {
            eprintln!("  No regions detected, fallback produced {} regions", regions.len());
        }
        tracing::info!(fallback = ?kind, regions = regions.len(), "no regions detected");

        let label = match kind {
            FallbackKind::CoarseThreshold => "coarse_threshold",
            FallbackKind::Placeholder => "placeholder",
            FallbackKind::Empty => "empty",
        };
        data.log(
            StageRecord::new("fallback")
                .with("kind", label)
                .with("regions", regions.len()),
        );

        data.proposals = regions;
        data.fallback = Some(kind);
        Ok(data)
    }

    fn name(&self) -> &str {
        "Fallback"
    }
}

/// First-pass typing from box shape
pub struct GeometricClassifyStep {
    pub config: ClassifierConfig,
}

impl PipelineStep for GeometricClassifyStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        data.elements = classify::classify_regions(&data.proposals, &self.config);
        data.log(StageRecord::new("classify").with("elements", data.elements.len()));
        Ok(data)
    }

    fn name(&self) -> &str {
        "Geometric Classification"
    }
}

/// Block and sparse OCR scans fused into the elements
pub struct TextExtractionStep {
    pub recognizer: Arc<dyn TextRecognizer>,
    pub config: OcrConfig,
}

impl PipelineStep for TextExtractionStep {
    fn process(&self, mut data: PipelineData, context: &PipelineContext) -> Result<PipelineData> {
        if context.verbose {
            eprintln!("  OCR engine: {}", self.recognizer.name());
        }

        let extraction = ocr::extract_text_lines(self.recognizer.as_ref(), &data.image, &self.config);

        let mut record = StageRecord::new("ocr")
            .with("engine", self.recognizer.name())
            .with("available", extraction.available)
            .with("lines", extraction.lines.len());
        if let Some(err) = &extraction.error {
            record = record.with("error", err.as_str());
        }
        data.log(record);

        ocr::fuse_text_lines(&mut data.elements, &extraction.lines, self.config.fusion_overlap_ratio);
        Ok(data)
    }

    fn name(&self) -> &str {
        "Text Extraction"
    }
}

/// Page palette plus per-element features and reclassification
pub struct VisualAnalysisStep {
    pub config: VisualConfig,
}

impl PipelineStep for VisualAnalysisStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let palette = visual::analyze_palette(&data.image, &self.config);
        let changed = visual::enhance_elements(&mut data.elements, &data.image, &palette, &self.config);

        data.log(
            StageRecord::new("enhanced_classification")
                .with("elements", data.elements.len())
                .with("reclassified", changed)
                .with("background", palette.background.hex.as_str()),
        );

        data.palette = Some(palette);
        Ok(data)
    }

    fn name(&self) -> &str {
        "Visual Analysis"
    }
}

/// Copy text sitting right above an input into its label
pub struct LabelAssociationStep {
    pub config: LabelConfig,
}

impl PipelineStep for LabelAssociationStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let labeled = layout::apply_labels(&mut data.elements, &self.config);
        data.log(StageRecord::new("labels").with("pairs", labeled));
        Ok(data)
    }

    fn name(&self) -> &str {
        "Label Association"
    }
}

/// Snap x edges to the column grid
pub struct GridSnapStep {
    pub config: GridConfig,
}

impl PipelineStep for GridSnapStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let width = data.width() as f32;
        layout::snap_elements(&mut data.elements, &self.config, width);
        data.log(
            StageRecord::new("grid_snap")
                .with("grid", self.config.name.as_str())
                .with("elements", data.elements.len()),
        );
        Ok(data)
    }

    fn name(&self) -> &str {
        "Grid Snap"
    }
}

/// Alignment, grouping and grid pattern of the final elements
pub struct LayoutAnalysisStep {
    pub config: LayoutConfig,
}

impl PipelineStep for LayoutAnalysisStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let mut summary = layout::analyze_layout(&data.elements, &self.config);
        summary.background = data.palette.as_ref().map(|p| p.background.clone());

        data.log(
            StageRecord::new("layout_analysis")
                .with("type", format!("{:?}", summary.kind).to_lowercase()),
        );

        data.layout = Some(summary);
        Ok(data)
    }

    fn name(&self) -> &str {
        "Layout Analysis"
    }
}
