use crate::config::{ClassifierConfig, GeometricRule};
use crate::ir::{Element, ElementType};
use crate::models::{BoxGeometry, Rect};

impl GeometricRule {
    /// Type this rule assigns
    pub fn kind(&self) -> ElementType {
        match self {
            GeometricRule::MinArea { kind, .. }
            | GeometricRule::Shape { kind, .. }
            | GeometricRule::Compact { kind, .. }
            | GeometricRule::Wide { kind, .. } => *kind,
        }
    }

    pub fn matches(&self, b: &impl BoxGeometry) -> bool {
        match self {
            GeometricRule::MinArea { min_area, .. } => b.area() >= *min_area,
            GeometricRule::Shape {
                aspect,
                height,
                min_width,
                ..
            } => aspect.contains(b.aspect_ratio()) && height.contains(b.height()) && b.width() >= *min_width,
            GeometricRule::Compact { aspect, min_side, .. } => {
                aspect.contains(b.aspect_ratio()) && min_side.contains(b.min_side())
            }
            GeometricRule::Wide {
                min_aspect,
                max_height,
                ..
            } => b.aspect_ratio() >= *min_aspect && b.height() <= *max_height,
        }
    }
}

/// First-pass type from geometry alone: the first matching ladder rule wins.
pub fn classify_geometry(b: &impl BoxGeometry, config: &ClassifierConfig) -> ElementType {
    config
        .ladder
        .iter()
        .find(|rule| rule.matches(b))
        .map(GeometricRule::kind)
        .unwrap_or(config.default_kind)
}

/// Turn deduplicated proposals into elements `el_0`, `el_1`, ... in proposal order.
pub fn classify_regions(regions: &[Rect], config: &ClassifierConfig) -> Vec<Element> {
    regions
        .iter()
        .enumerate()
        .map(|(i, r)| Element::new(format!("el_{}", i), classify_geometry(r, config), r.to_bbox()))
        .collect()
}
