mod common;

use common::*;
use shot2ir::detection::ocr::{extract_text_lines, fuse_text_lines};
use shot2ir::NoopRecognizer;
use std::sync::Arc;

fn detect_with(recognizer: Arc<dyn TextRecognizer>) -> (IrDocument, Vec<StageRecord>) {
    let mut records: Vec<StageRecord> = Vec::new();
    let ir = Detector::default()
        .with_recognizer(recognizer)
        .detect(&login_screen(), &mut records)
        .expect("detection failed");
    (ir, records)
}

#[test]
fn recognized_text_becomes_text_elements() {
    let (ir, records) = detect_with(Arc::new(login_text()));

    let texts: Vec<(&str, Option<&str>)> = ir
        .elements_of(ElementType::Text)
        .map(|el| (el.id.as_str(), el.text.as_deref()))
        .collect();
    assert_eq!(
        texts,
        vec![("text_0", Some("Email")), ("text_1", Some("Forgot password?"))]
    );

    let ocr = records_for(&records, "ocr");
    assert_eq!(ocr[0].get_bool("available"), Some(true));
    assert_eq!(ocr[0].get_int("lines"), Some(2));
}

#[test]
fn label_above_input_is_associated() {
    let (ir, _) = detect_with(Arc::new(login_text()));

    let inputs: Vec<&Element> = ir.elements_of(ElementType::Input).collect();
    assert_eq!(inputs.len(), 2);
    assert_eq!(inputs[0].label.as_deref(), Some("Email"));
    assert_eq!(inputs[1].label, None);
}

#[test]
fn failing_engine_degrades_to_no_text() {
    let (ir, records) = detect_with(Arc::new(BrokenRecognizer));

    assert_eq!(ir.elements.len(), 3);
    assert!(ir.elements.iter().all(|el| el.text.is_none()));

    let ocr = records_for(&records, "ocr");
    assert_eq!(ocr[0].get_bool("available"), Some(false));
    assert_eq!(ocr[0].get_string("engine"), Some("broken"));
}

#[test]
fn disabled_ocr_skips_the_engine() {
    let mut config = DetectorConfig::default();
    config.ocr.enabled = false;

    let img = login_screen().to_rgb8();
    let extraction = extract_text_lines(&login_text(), &img, &config.ocr);
    assert!(!extraction.available);
    assert!(extraction.lines.is_empty());

    let none = extract_text_lines(&NoopRecognizer, &img, &DetectorConfig::default().ocr);
    assert!(!none.available);
}

#[test]
fn fusing_twice_keeps_the_element_count() {
    let img = login_screen().to_rgb8();
    let config = DetectorConfig::default().ocr;
    let lines = extract_text_lines(&login_text(), &img, &config).lines;

    let mut elements = vec![
        Element::new("el_0", ElementType::Input, [40.0, 100.0, 440.0, 148.0]),
        Element::new("el_1", ElementType::Button, [40.0, 280.0, 440.0, 332.0]),
    ];
    // Sits on the button, so it labels it rather than creating a new element
    let mut lines = lines;
    lines.push(OcrLine::new("Sign in", 0.95, [180.0, 295.0, 300.0, 318.0]));

    fuse_text_lines(&mut elements, &lines, config.fusion_overlap_ratio);
    let once = elements.clone();
    fuse_text_lines(&mut elements, &lines, config.fusion_overlap_ratio);

    assert_eq!(elements, once);
    assert_eq!(elements.len(), 4);
    assert_eq!(elements[1].text.as_deref(), Some("Sign in"));
    assert_eq!(elements[1].confidence, Some(0.95));
}
