mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from nucleiseg for tests
pub use nucleiseg::{
    Frame, LabelImage, LabelVolume, Param, ParameterVector, Pipeline, PreviewController,
    SegmentError, Stack, Stage, StageView, segment_frame, segment_stack,
};
