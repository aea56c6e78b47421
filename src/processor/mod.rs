//! Segment chunking and the pipeline orchestrator

pub mod pipeline;
pub mod segment;

pub use pipeline::{
    Pipeline, PipelineResult, PipelineState, StageReport, StageStatus, enhance,
    enhance_with_separator,
};
pub use segment::Segment;
