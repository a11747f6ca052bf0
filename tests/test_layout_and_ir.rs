mod common;

use common::*;
use shot2ir::config::{ClassifierConfig, GridConfig, LabelConfig, LayoutConfig};
use shot2ir::detection::classify::classify_geometry;
use shot2ir::detection::dedup::deduplicate;
use shot2ir::detection::layout::{
    analyze_layout, associate_labels, snap_to_grid, Alignment, LayoutKind,
};
use shot2ir::ir::IrViolation;
use shot2ir::Rect;

fn kind_of(bbox: [f32; 4]) -> ElementType {
    classify_geometry(&bbox, &ClassifierConfig::default())
}

fn el(id: &str, kind: ElementType, bbox: [f32; 4]) -> Element {
    Element::new(id, kind, bbox)
}

#[test]
fn heavy_overlap_keeps_the_first_box() {
    let first = Rect::new(10, 10, 110, 60);
    let shifted = Rect::new(14, 12, 112, 62);
    let separate = Rect::new(10, 100, 110, 150);

    let kept = deduplicate(&[first, shifted, separate], 0.7);
    assert_eq!(kept, vec![first, separate]);
}

#[test]
fn partial_overlap_keeps_both() {
    let a = Rect::new(0, 0, 100, 40);
    let b = Rect::new(50, 0, 150, 40);
    assert_eq!(deduplicate(&[a, b], 0.7).len(), 2);
}

#[test]
fn input_wins_over_button_for_ambiguous_shapes() {
    // Aspect 5, height 40: inside both the input and the button windows
    assert_eq!(kind_of([0.0, 0.0, 200.0, 40.0]), ElementType::Input);
}

#[test]
fn geometric_ladder_order() {
    assert_eq!(kind_of([0.0, 0.0, 400.0, 60.0]), ElementType::Container);
    assert_eq!(kind_of([0.0, 0.0, 50.0, 40.0]), ElementType::Button);
    assert_eq!(kind_of([0.0, 0.0, 30.0, 60.0]), ElementType::Image);
    assert_eq!(kind_of([0.0, 0.0, 30.0, 10.0]), ElementType::Text);
    assert_eq!(kind_of([0.0, 0.0, 5.0, 5.0]), ElementType::Container);
}

#[test]
fn grid_snap_stays_within_container() {
    let [x1, y1, x2, y2] = snap_to_grid([30.0, 12.0, 450.0, 60.0], &GridConfig::default());
    assert!(x1 >= 24.0);
    assert!(x2 <= 480.0);
    assert_eq!((y1, y2), (12.0, 60.0));
}

#[test]
fn stacked_form_is_centered() {
    let elements = vec![
        el("el_0", ElementType::Input, [40.0, 100.0, 440.0, 148.0]),
        el("el_1", ElementType::Input, [40.0, 180.0, 440.0, 228.0]),
        el("el_2", ElementType::Button, [40.0, 280.0, 440.0, 332.0]),
    ];
    let layout = analyze_layout(&elements, &LayoutConfig::default());

    assert_eq!(layout.alignment, Alignment::Center);
    assert_eq!(layout.horizontal_groups, Some(3));
    assert_eq!(layout.vertical_groups, Some(1));
    assert_eq!(layout.kind, LayoutKind::Linear);
    assert_eq!(layout.grid.map(|g| g.detected), Some(false));
}

#[test]
fn regular_tiles_form_a_grid() {
    let mut elements = Vec::new();
    for row in 0..3 {
        for col in 0..3 {
            let (x, y) = (20.0 + col as f32 * 120.0, 40.0 + row as f32 * 100.0);
            elements.push(el(
                &format!("el_{}", row * 3 + col),
                ElementType::Image,
                [x, y, x + 80.0, y + 80.0],
            ));
        }
    }
    let layout = analyze_layout(&elements, &LayoutConfig::default());

    assert_eq!(layout.kind, LayoutKind::Grid);
    let grid = layout.grid.unwrap();
    assert_eq!((grid.columns, grid.rows), (Some(3), Some(3)));
    assert_eq!((grid.spacing_x, grid.spacing_y), (Some(120.0), Some(100.0)));
    assert_eq!(layout.alignment, Alignment::Mixed);
}

#[test]
fn single_element_layout() {
    let elements = vec![el("el_0", ElementType::Image, [0.0, 0.0, 10.0, 10.0])];
    let layout = analyze_layout(&elements, &LayoutConfig::default());
    assert_eq!(layout.kind, LayoutKind::Single);
    assert_eq!(layout.alignment, Alignment::None);
    assert!(layout.grid.is_none());
}

#[test]
fn nearest_input_gets_the_label() {
    let elements = vec![
        el("text_0", ElementType::Text, [40.0, 70.0, 120.0, 90.0]).with_text("Name", 0.9),
        el("el_0", ElementType::Input, [40.0, 110.0, 440.0, 150.0]),
        el("el_1", ElementType::Input, [40.0, 95.0, 440.0, 105.0]),
        el("el_2", ElementType::Input, [300.0, 92.0, 440.0, 132.0]),
    ];
    let pairs = associate_labels(&elements, &LabelConfig::default());
    assert_eq!(pairs, vec![("text_0".to_string(), "el_1".to_string())]);
}

#[test]
fn validate_reports_broken_documents() {
    let (ir, _) = {
        let mut records: Vec<StageRecord> = Vec::new();
        let ir = Detector::default().detect(&login_screen(), &mut records).unwrap();
        (ir, records)
    };
    assert!(ir.validate().is_empty());

    let mut broken = ir.clone();
    broken.elements[1].id = broken.elements[0].id.clone();
    broken.elements[2].bbox = [10.0, 10.0, 900.0, 5.0];
    let violations = broken.validate();

    assert!(violations.contains(&IrViolation::DuplicateId(ir.elements[0].id.clone())));
    assert!(violations
        .iter()
        .any(|v| matches!(v, IrViolation::OutOfBounds { .. })));
    assert!(violations.iter().any(|v| matches!(v, IrViolation::Inverted { .. })));
}

#[test]
fn ir_save_and_load() -> anyhow::Result<()> {
    let mut records: Vec<StageRecord> = Vec::new();
    let ir = Detector::default().detect(&login_screen(), &mut records)?;

    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("nested").join("screen.json");
    ir.save(&path)?;

    let raw = std::fs::read_to_string(&path)?;
    assert!(raw.contains("\"type\": \"button\""));
    assert!(raw.contains("\"schema\": 1"));
    assert!(!raw.contains("\"label\""));

    assert_eq!(IrDocument::load(&path)?, ir);
    Ok(())
}

#[test]
fn config_file_overrides_defaults() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"classifier": {"strategy": "baseline"}, "grid": {"columns": 6}}"#,
    )?;

    let config = DetectorConfig::from_json_file(&path)?;
    assert_eq!(config.classifier.strategy, ClassifierStrategy::Baseline);
    assert_eq!(config.grid.columns, 6);
    assert_eq!(config.grid.margin, 24.0);
    assert_eq!(config.classifier.ladder, ClassifierConfig::default().ladder);
    Ok(())
}

#[test]
fn element_type_names_match_the_json() -> anyhow::Result<()> {
    for kind in [
        ElementType::Text,
        ElementType::Input,
        ElementType::Button,
        ElementType::Image,
        ElementType::Container,
    ] {
        assert_eq!(serde_json::to_string(&kind)?, format!("\"{}\"", kind.as_str()));
    }
    Ok(())
}
