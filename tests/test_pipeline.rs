mod common;

use common::*;
use shot2ir::{build_standard_pipeline, NoopRecognizer, Pipeline, PipelineContext, PipelineData, PipelineStep};
use std::sync::Arc;

struct CountElements;

impl PipelineStep for CountElements {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> anyhow::Result<PipelineData> {
        let record = StageRecord::new("count").with("elements", data.elements.len());
        data.log(record);
        Ok(data)
    }

    fn name(&self) -> &str {
        "Count Elements"
    }
}

#[test]
fn standard_pipeline_step_order() {
    let enhanced = build_standard_pipeline(&DetectorConfig::default(), Arc::new(NoopRecognizer));
    assert_eq!(
        enhanced.step_names(),
        vec![
            "Preprocess",
            "Region Proposals",
            "Deduplicate",
            "Fallback",
            "Geometric Classification",
            "Text Extraction",
            "Visual Analysis",
            "Label Association",
            "Grid Snap",
            "Layout Analysis",
        ]
    );

    let baseline = build_standard_pipeline(
        &DetectorConfig::default().with_strategy(ClassifierStrategy::Baseline),
        Arc::new(NoopRecognizer),
    );
    assert!(!baseline.step_names().contains(&"Visual Analysis"));
}

#[test]
fn partial_run_stops_before_classification() -> anyhow::Result<()> {
    let pipeline = build_standard_pipeline(&DetectorConfig::default(), Arc::new(NoopRecognizer));
    let mut records: Vec<StageRecord> = Vec::new();

    let data = pipeline.run_partial(login_screen(), 3, &mut records)?;

    assert!(data.mask.is_some());
    assert_eq!(data.proposals.len(), 3);
    assert!(data.elements.is_empty());
    assert_eq!(records.last().map(|r| r.stage.as_str()), Some("dedup"));
    Ok(())
}

#[test]
fn custom_steps_can_be_appended() -> anyhow::Result<()> {
    let pipeline = build_standard_pipeline(&DetectorConfig::default(), Arc::new(NoopRecognizer))
        .add_step_boxed(Box::new(CountElements));
    let mut records: Vec<StageRecord> = Vec::new();

    pipeline.run(login_screen(), &mut records)?;

    let count = records_for(&records, "count");
    assert_eq!(count[0].get_int("elements"), Some(3));
    Ok(())
}

#[test]
fn empty_pipeline_returns_the_input() -> anyhow::Result<()> {
    let data = Pipeline::new().run(blank_screen(), &mut Vec::<StageRecord>::new())?;
    assert_eq!((data.width(), data.height()), (480, 640));
    assert!(data.proposals.is_empty());
    Ok(())
}
