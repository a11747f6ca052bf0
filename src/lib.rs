pub mod config;
pub mod detection;
pub mod error;
pub mod ir;
pub mod models;
pub mod pipeline;

pub use config::{ClassifierStrategy, DetectorConfig, FallbackMode};
pub use detection::ocr::{NoopRecognizer, OcrLine, OcrsRecognizer, ScanMode, TextRecognizer};
pub use detection::{build_standard_pipeline, Detector};
pub use error::DetectError;
pub use ir::{Element, ElementType, IrDocument, IrMeta};
pub use models::{BBox, BoxGeometry, Rect};
pub use pipeline::{
    DebugConfig, LogSink, MetadataValue, Pipeline, PipelineContext, PipelineData, PipelineStep,
    StageRecord,
};
