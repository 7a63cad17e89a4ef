use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the segmentation core.
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("parameter vector must have {expected} entries, got {found}")]
    InvalidParameterCount { expected: usize, found: usize },

    #[error("parameter {index} ({name}) = {value} is invalid: {reason}")]
    InvalidParameter {
        index: usize,
        name: &'static str,
        value: f32,
        reason: &'static str,
    },

    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },

    #[error("stack contains no frames")]
    EmptyStack,

    #[error("frame index {index} out of range for a stack of {len} frames")]
    FrameOutOfRange { index: usize, len: usize },

    #[error("segmentation of frame {index} failed: {source}")]
    Frame {
        index: usize,
        #[source]
        source: Box<SegmentError>,
    },

    #[error("segmentation cancelled after {completed} frames")]
    Cancelled { completed: usize },

    #[error("stage '{stage}' ran without its input artifact '{artifact}'")]
    MissingArtifact {
        stage: &'static str,
        artifact: &'static str,
    },

    #[error("unknown preview stage {0}")]
    UnknownStage(u8),

    #[error("debug directory is not empty: {}", .0.display())]
    DebugDirNotEmpty(PathBuf),

    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write image '{}': {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

pub type Result<T> = std::result::Result<T, SegmentError>;
