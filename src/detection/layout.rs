//! Grid snapping, label association and page-level layout inference.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::{GridConfig, LabelConfig, LayoutConfig};
use crate::detection::visual::PaletteColor;
use crate::ir::{Element, ElementType};
use crate::models::{BBox, BoxGeometry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    Single,
    Grid,
    Linear,
    Form,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Center,
    Left,
    Right,
    Mixed,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPattern {
    pub detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spacing_x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spacing_y: Option<f32>,
}

impl GridPattern {
    fn none() -> Self {
        Self {
            detected: false,
            columns: None,
            rows: None,
            spacing_x: None,
            spacing_y: None,
        }
    }
}

/// What `meta.layout` reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutSummary {
    #[serde(rename = "type")]
    pub kind: LayoutKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal_groups: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical_groups: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridPattern>,
    pub alignment: Alignment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<PaletteColor>,
}

/// Snap both x edges to the nearest column boundary; y is untouched.
pub fn snap_to_grid(bbox: BBox, grid: &GridConfig) -> BBox {
    let [x1, y1, x2, y2] = bbox;
    let columns = grid.columns.max(1) as f32;
    let col_w = (grid.container_width - 2.0 * grid.margin) / columns;
    if col_w <= 0.0 {
        return bbox;
    }
    let snap = |x: f32| grid.margin + ((x - grid.margin) / col_w).round() * col_w;
    [snap(x1), y1, snap(x2), y2]
}

/// Snap every element and clip the result back into `[0, width]`.
pub fn snap_elements(elements: &mut [Element], grid: &GridConfig, width: f32) {
    for el in elements {
        let [x1, y1, x2, y2] = snap_to_grid(el.bbox, grid);
        el.bbox = [x1.clamp(0.0, width), y1, x2.clamp(0.0, width), y2];
    }
}

/// Greedy tolerance clustering of 1-D positions. Returns index groups in ascending
/// position order; a group's anchor is its first (smallest) position.
pub fn group_by_position(positions: &[f32], tolerance: f32) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..positions.len()).collect();
    order.sort_by(|&a, &b| positions[a].total_cmp(&positions[b]));

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut anchor = f32::NEG_INFINITY;
    for idx in order {
        let pos = positions[idx];
        match groups.last_mut() {
            Some(group) if (pos - anchor).abs() <= tolerance => group.push(idx),
            _ => {
                groups.push(vec![idx]);
                anchor = pos;
            }
        }
    }
    groups
}

fn distinct_rounded(values: impl Iterator<Item = f32>) -> Vec<i64> {
    values
        .map(|v| v.round() as i64)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn is_regular_spacing(coords: &[i64], tolerance: f32) -> bool {
    if coords.len() < 3 {
        return false;
    }
    let gaps: Vec<f32> = coords.windows(2).map(|w| (w[1] - w[0]) as f32).collect();
    let mean = gaps.iter().sum::<f32>() / gaps.len() as f32;
    gaps.iter().all(|g| (g - mean).abs() <= tolerance)
}

/// Regularly spaced element centres in both directions.
pub fn detect_grid_pattern(boxes: &[BBox], config: &LayoutConfig) -> GridPattern {
    if boxes.len() < config.grid_min_elements {
        return GridPattern::none();
    }

    let xs = distinct_rounded(boxes.iter().map(|b| b.center().0));
    let ys = distinct_rounded(boxes.iter().map(|b| b.center().1));

    if !(is_regular_spacing(&xs, config.spacing_tolerance)
        && is_regular_spacing(&ys, config.spacing_tolerance))
    {
        return GridPattern::none();
    }

    GridPattern {
        detected: true,
        columns: Some(xs.len()),
        rows: Some(ys.len()),
        spacing_x: Some((xs[1] - xs[0]) as f32),
        spacing_y: Some((ys[1] - ys[0]) as f32),
    }
}

/// Which vertical edge the elements share, center first.
pub fn detect_alignment(boxes: &[BBox]) -> Alignment {
    if boxes.len() < 2 {
        return Alignment::None;
    }
    let collapses = |f: fn(&BBox) -> f32| distinct_rounded(boxes.iter().map(f)).len() <= 2;

    if collapses(|b| b.center().0) {
        Alignment::Center
    } else if collapses(|b| b[0]) {
        Alignment::Left
    } else if collapses(|b| b[2]) {
        Alignment::Right
    } else {
        Alignment::Mixed
    }
}

pub fn analyze_layout(elements: &[Element], config: &LayoutConfig) -> LayoutSummary {
    if elements.len() < 2 {
        return LayoutSummary {
            kind: LayoutKind::Single,
            horizontal_groups: None,
            vertical_groups: None,
            grid: None,
            alignment: Alignment::None,
            background: None,
        };
    }

    let boxes: Vec<BBox> = elements.iter().map(|el| el.bbox).collect();
    let tops: Vec<f32> = boxes.iter().map(|b| b[1]).collect();
    let lefts: Vec<f32> = boxes.iter().map(|b| b[0]).collect();
    let horizontal = group_by_position(&tops, config.alignment_tolerance).len();
    let vertical = group_by_position(&lefts, config.alignment_tolerance).len();

    let grid = detect_grid_pattern(&boxes, config);
    let kind = if grid.detected {
        LayoutKind::Grid
    } else if horizontal > 2 {
        LayoutKind::Linear
    } else {
        LayoutKind::Form
    };

    LayoutSummary {
        kind,
        horizontal_groups: Some(horizontal),
        vertical_groups: Some(vertical),
        grid: Some(grid),
        alignment: detect_alignment(&boxes),
        background: None,
    }
}

/// Pair each text element with the input right below it.
///
/// Returns `(label_id, input_id)` pairs. When several inputs qualify for one label the
/// one with the smallest vertical gap wins.
pub fn associate_labels(elements: &[Element], config: &LabelConfig) -> Vec<(String, String)> {
    let inputs: Vec<&Element> = elements
        .iter()
        .filter(|el| el.kind == ElementType::Input)
        .collect();

    elements
        .iter()
        .filter(|el| el.kind == ElementType::Text && el.has_text())
        .filter_map(|label| {
            inputs
                .iter()
                .filter_map(|input| {
                    let gap = input.bbox[1] - label.bbox[3];
                    let max_gap = config.max_vertical_gap_ratio * input.bbox.height().max(1e-6);
                    let fits = (0.0..=max_gap).contains(&gap)
                        && label.bbox.horizontal_overlap_ratio(&input.bbox)
                            >= config.min_horizontal_overlap_ratio;
                    fits.then_some((gap, input))
                })
                .min_by(|a, b| a.0.total_cmp(&b.0))
                .map(|(_, input)| (label.id.clone(), input.id.clone()))
        })
        .collect()
}

/// Copy each associated label's text onto its input. Returns the number of inputs labeled.
pub fn apply_labels(elements: &mut [Element], config: &LabelConfig) -> usize {
    let pairs = associate_labels(elements, config);
    for (label_id, input_id) in &pairs {
        let text = elements
            .iter()
            .find(|el| &el.id == label_id)
            .and_then(|el| el.text.clone());
        if let Some(input) = elements.iter_mut().find(|el| &el.id == input_id) {
            input.label = text;
        }
    }
    pairs.len()
}
