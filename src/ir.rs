//! The IR document: the pipeline's only output.
//!
//! Field order in these structs is the JSON field order, and optional fields are skipped
//! when absent, so serializing the same document always yields the same bytes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::detection::layout::LayoutSummary;
use crate::models::BBox;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrDocument {
    pub meta: IrMeta,
    pub elements: Vec<Element>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrMeta {
    pub schema: u32,
    pub title: String,
    pub w: f32,
    pub h: f32,
    pub grid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutSummary>,
    /// Set when the fallback ladder produced (or failed to produce) the elements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackKind {
    /// Regions came from the coarse near-white threshold.
    CoarseThreshold,
    /// Regions are synthetic placeholders.
    Placeholder,
    /// Nothing was detected and no placeholders were requested.
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Text,
    Input,
    Button,
    Image,
    Container,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Text => "text",
            ElementType::Input => "input",
            ElementType::Button => "button",
            ElementType::Image => "image",
            ElementType::Container => "container",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

/// Per-region color and texture measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualFeatures {
    pub avg_color: [f32; 3],
    pub dominant_color: [u8; 3],
    pub has_border: bool,
    pub fill_ratio: f32,
    pub is_uniform: bool,
}

/// One detected UI region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ElementType,
    pub bbox: BBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<ElementStyle>,
    #[serde(flatten)]
    pub visual: Option<VisualFeatures>,
}

impl Element {
    pub fn new(id: impl Into<String>, kind: ElementType, bbox: BBox) -> Self {
        Self {
            id: id.into(),
            kind,
            bbox,
            text: None,
            confidence: None,
            label: None,
            src: None,
            secure: None,
            placeholder: None,
            style: None,
            visual: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>, confidence: f32) -> Self {
        self.text = Some(text.into());
        self.confidence = Some(confidence);
        self
    }

    /// True when OCR attached non-empty text to this element.
    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// A broken IR invariant, as reported by [`IrDocument::validate`].
#[derive(Debug, Clone, PartialEq)]
pub enum IrViolation {
    DuplicateId(String),
    OutOfBounds { id: String, bbox: BBox },
    Inverted { id: String, bbox: BBox },
}

impl IrDocument {
    /// Check the invariants the pipeline guarantees on top of the published schema:
    /// unique ids and in-bounds, non-inverted bounding boxes.
    pub fn validate(&self) -> Vec<IrViolation> {
        let (w, h) = (self.meta.w, self.meta.h);
        let mut seen = HashSet::new();
        let mut violations = Vec::new();

        for el in &self.elements {
            if !seen.insert(el.id.as_str()) {
                violations.push(IrViolation::DuplicateId(el.id.clone()));
            }
            let [x1, y1, x2, y2] = el.bbox;
            let in_x = |v: f32| (0.0..=w).contains(&v);
            let in_y = |v: f32| (0.0..=h).contains(&v);
            if !(in_x(x1) && in_x(x2) && in_y(y1) && in_y(y2)) {
                violations.push(IrViolation::OutOfBounds {
                    id: el.id.clone(),
                    bbox: el.bbox,
                });
            }
            if x2 < x1 || y2 < y1 {
                violations.push(IrViolation::Inverted {
                    id: el.id.clone(),
                    bbox: el.bbox,
                });
            }
        }

        violations
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize IR")
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Invalid IR document")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_json_pretty()?)
            .with_context(|| format!("Failed to write IR to {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read IR from {}", path.display()))?;
        Self::from_json(&raw)
    }

    /// Elements of a given type, in document order.
    pub fn elements_of(&self, kind: ElementType) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(move |el| el.kind == kind)
    }
}
