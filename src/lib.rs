pub mod batch;
pub mod error;
pub mod models;
pub mod params;
pub mod pipeline;
pub mod preview;
pub mod segmentation;

pub use batch::{CancelToken, StackSegmenter, segment_stack};
pub use error::{Result, SegmentError};
pub use models::{
    BinaryMask, ChannelSet, DistanceMap, Frame, LabelImage, LabelVolume, MarkerImage, Stack,
};
pub use params::{PARAM_COUNT, Param, ParameterSpec, ParameterVector};
pub use pipeline::{
    DebugConfig, FrameArtifacts, Pipeline, PipelineContext, PipelineStep, Stage, StageView,
};
pub use preview::PreviewController;
pub use segmentation::segment_frame;
