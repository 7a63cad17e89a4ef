use image::{DynamicImage, ImageBuffer, Luma};

use crate::error::{Result, SegmentError};

/// A single 2-D intensity image.
pub type Frame = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Euclidean distance to background, normalised to [0, 1].
pub type DistanceMap = Frame;

/// Foreground candidates: 255 = foreground, 0 = background.
pub type BinaryMask = ImageBuffer<Luma<u8>, Vec<u8>>;

/// Seed regions: 0 = unmarked, positive values are distinct seeds.
pub type MarkerImage = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Segmented objects: 0 = background, positive values are object ids.
pub type LabelImage = ImageBuffer<Luma<u32>, Vec<u32>>;

pub const FOREGROUND: u8 = 255;

/// Convert any decoded image into a single-channel float frame in [0, 1].
pub fn frame_from_image(img: &DynamicImage) -> Frame {
    img.to_luma32f()
}

/// Frames of equal shape, indexed by frame number.
#[derive(Debug, Clone)]
pub struct Stack {
    frames: Vec<Frame>,
}

impl Stack {
    pub fn new(frames: Vec<Frame>) -> Result<Self> {
        let first = frames.first().ok_or(SegmentError::EmptyStack)?;
        let expected = first.dimensions();
        for frame in &frames {
            ensure_shape(expected, frame.dimensions())?;
        }
        Ok(Self { frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// (width, height) shared by every frame.
    pub fn dimensions(&self) -> (u32, u32) {
        self.frames[0].dimensions()
    }

    pub fn frame(&self, index: usize) -> Result<&Frame> {
        self.frames.get(index).ok_or(SegmentError::FrameOutOfRange {
            index,
            len: self.frames.len(),
        })
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}

/// One stack per acquisition channel. Only one channel is segmented at a time.
#[derive(Debug, Clone)]
pub struct ChannelSet {
    channels: Vec<Stack>,
}

impl ChannelSet {
    pub fn new(channels: Vec<Stack>) -> Result<Self> {
        let first = channels.first().ok_or(SegmentError::EmptyStack)?;
        let expected = first.dimensions();
        for stack in &channels {
            ensure_shape(expected, stack.dimensions())?;
        }
        Ok(Self { channels })
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channel(&self, index: usize) -> Option<&Stack> {
        self.channels.get(index)
    }
}

/// One label image per stack frame, in frame order.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelVolume {
    labels: Vec<LabelImage>,
}

impl LabelVolume {
    /// Pre-allocate an all-background volume.
    pub fn zeros(frames: usize, width: u32, height: u32) -> Self {
        Self {
            labels: vec![LabelImage::new(width, height); frames],
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LabelImage> {
        self.labels.get(index)
    }

    pub fn set(&mut self, index: usize, label: LabelImage) -> Result<()> {
        let len = self.labels.len();
        let slot = self
            .labels
            .get_mut(index)
            .ok_or(SegmentError::FrameOutOfRange { index, len })?;
        ensure_shape(slot.dimensions(), label.dimensions())?;
        *slot = label;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabelImage> {
        self.labels.iter()
    }

    pub fn into_inner(self) -> Vec<LabelImage> {
        self.labels
    }
}

impl From<Vec<LabelImage>> for LabelVolume {
    fn from(labels: Vec<LabelImage>) -> Self {
        Self { labels }
    }
}

pub(crate) fn ensure_shape(expected: (u32, u32), found: (u32, u32)) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(SegmentError::ShapeMismatch { expected, found })
    }
}
