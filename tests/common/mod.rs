mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from shot2ir for tests
pub use shot2ir::{
    ClassifierStrategy, Detector, DetectorConfig, Element, ElementType, FallbackMode, IrDocument,
    OcrLine, ScanMode, StageRecord, TextRecognizer,
};
