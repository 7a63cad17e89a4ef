use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use image::{ImageBuffer, Luma};
use log::debug;

use crate::error::{Result, SegmentError};
use crate::models::{BinaryMask, DistanceMap, Frame, LabelImage, MarkerImage};
use crate::params::{Param, ParameterVector};
use crate::segmentation::steps::*;

/// Position in the segmentation state machine.
///
/// Stage 0 is idle (raw frame). Stage 1 is the edge branch, which only
/// depends on the clipped frame and so can be recomputed on its own.
/// Stages 2..=8 are the main chain and stage 9 is the watershed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Stage {
    Idle = 0,
    EdgeMap = 1,
    Clip = 2,
    Background = 3,
    Smooth = 4,
    Threshold = 5,
    ObjectFilter = 6,
    CenterBlend = 7,
    Markers = 8,
    Watershed = 9,
}

impl Stage {
    /// Execution order of a full run.
    pub const ORDER: [Stage; 9] = [
        Stage::Clip,
        Stage::Background,
        Stage::Smooth,
        Stage::Threshold,
        Stage::ObjectFilter,
        Stage::CenterBlend,
        Stage::Markers,
        Stage::EdgeMap,
        Stage::Watershed,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    /// Parameter a control bound to this stage edits.
    pub fn param(self) -> Option<Param> {
        match self {
            Stage::Idle => None,
            Stage::EdgeMap => Some(Param::EdgeBlurRadius),
            Stage::Clip => Some(Param::ClipLimit),
            Stage::Background => Some(Param::BackgroundRadius),
            Stage::Smooth => Some(Param::SmoothRadius),
            Stage::Threshold => Some(Param::Threshold),
            Stage::ObjectFilter => Some(Param::MinObjectSize),
            Stage::CenterBlend => Some(Param::CenterWeight),
            Stage::Markers => Some(Param::MinSeparation),
            Stage::Watershed => Some(Param::WatershedRatio),
        }
    }

    /// Stages whose outputs this stage reads.
    pub fn inputs(self) -> &'static [Stage] {
        match self {
            Stage::Idle | Stage::Clip => &[],
            Stage::EdgeMap => &[Stage::Clip],
            Stage::Background => &[Stage::Clip],
            Stage::Smooth => &[Stage::Background],
            Stage::Threshold => &[Stage::Smooth],
            Stage::ObjectFilter => &[Stage::Threshold],
            Stage::CenterBlend => &[Stage::Smooth, Stage::ObjectFilter],
            Stage::Markers => &[Stage::CenterBlend, Stage::ObjectFilter],
            Stage::Watershed => &[Stage::Markers, Stage::ObjectFilter, Stage::EdgeMap],
        }
    }

    /// True when `self` reads, directly or transitively, the output of `other`.
    pub fn depends_on(self, other: Stage) -> bool {
        self.inputs()
            .iter()
            .any(|&input| input == other || input.depends_on(other))
    }
}

impl TryFrom<u8> for Stage {
    type Error = SegmentError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Stage::Idle,
            1 => Stage::EdgeMap,
            2 => Stage::Clip,
            3 => Stage::Background,
            4 => Stage::Smooth,
            5 => Stage::Threshold,
            6 => Stage::ObjectFilter,
            7 => Stage::CenterBlend,
            8 => Stage::Markers,
            9 => Stage::Watershed,
            other => return Err(SegmentError::UnknownStage(other)),
        })
    }
}

/// Borrowed view of one stage output, for display or dumping.
#[derive(Debug, Clone, Copy)]
pub enum StageView<'a> {
    Image(&'a Frame),
    Mask(&'a BinaryMask),
    Labels(&'a LabelImage),
}

/// Everything computed for one frame. Each field is filled by one stage.
///
/// The input frame is shared through an `Arc` so suffix reruns and batch
/// workers never copy it.
#[derive(Debug, Clone)]
pub struct FrameArtifacts {
    pub frame_index: usize,
    pub input: Arc<Frame>,
    pub clipped: Option<Frame>,
    pub background_subtracted: Option<Frame>,
    pub smoothed: Option<Frame>,
    pub thresholded: Option<BinaryMask>,
    pub mask: Option<BinaryMask>,
    pub distance: Option<DistanceMap>,
    pub centers: Option<Frame>,
    pub markers: Option<MarkerImage>,
    pub edges: Option<Frame>,
    pub labels: Option<LabelImage>,
}

impl FrameArtifacts {
    pub fn new(input: Arc<Frame>, frame_index: usize) -> Self {
        Self {
            frame_index,
            input,
            clipped: None,
            background_subtracted: None,
            smoothed: None,
            thresholded: None,
            mask: None,
            distance: None,
            centers: None,
            markers: None,
            edges: None,
            labels: None,
        }
    }

    pub fn view(&self, stage: Stage) -> Option<StageView<'_>> {
        match stage {
            Stage::Idle => Some(StageView::Image(&self.input)),
            Stage::Clip => self.clipped.as_ref().map(StageView::Image),
            Stage::Background => self.background_subtracted.as_ref().map(StageView::Image),
            Stage::Smooth => self.smoothed.as_ref().map(StageView::Image),
            Stage::Threshold => self.thresholded.as_ref().map(StageView::Mask),
            Stage::ObjectFilter => self.mask.as_ref().map(StageView::Mask),
            Stage::CenterBlend => self.centers.as_ref().map(StageView::Image),
            Stage::Markers => self.markers.as_ref().map(StageView::Labels),
            Stage::EdgeMap => self.edges.as_ref().map(StageView::Image),
            Stage::Watershed => self.labels.as_ref().map(StageView::Labels),
        }
    }

    pub fn has(&self, stage: Stage) -> bool {
        self.view(stage).is_some()
    }

    /// Drop the output of a single stage.
    pub fn clear(&mut self, stage: Stage) {
        match stage {
            Stage::Idle => {}
            Stage::Clip => self.clipped = None,
            Stage::Background => self.background_subtracted = None,
            Stage::Smooth => self.smoothed = None,
            Stage::Threshold => self.thresholded = None,
            Stage::ObjectFilter => self.mask = None,
            Stage::CenterBlend => {
                self.distance = None;
                self.centers = None;
            }
            Stage::Markers => self.markers = None,
            Stage::EdgeMap => self.edges = None,
            Stage::Watershed => self.labels = None,
        }
    }

    /// Drop `stage` and every stage that reads it.
    pub fn invalidate(&mut self, stage: Stage) {
        for s in Stage::ORDER {
            if s == stage || s.depends_on(stage) {
                self.clear(s);
            }
        }
    }

    pub fn into_labels(self) -> Result<LabelImage> {
        self.labels.ok_or(SegmentError::MissingArtifact {
            stage: "watershed",
            artifact: "labels",
        })
    }
}

/// Borrow a required upstream artifact or report which one is missing.
pub fn require<'a, T>(
    slot: &'a Option<T>,
    stage: &'static str,
    artifact: &'static str,
) -> Result<&'a T> {
    slot.as_ref()
        .ok_or(SegmentError::MissingArtifact { stage, artifact })
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

/// Context available to all pipeline steps
#[derive(Clone, Debug, Default)]
pub struct PipelineContext {
    pub debug: Option<DebugConfig>,
}

/// One stage of the segmentation chain.
pub trait PipelineStep: Send + Sync {
    /// Read upstream artifacts from `data` and store this stage's output.
    fn process(&self, data: &mut FrameArtifacts, params: &ParameterVector) -> Result<()>;

    /// Human-readable name for this step (used in logs and debug folders)
    fn name(&self) -> &'static str;

    fn stage(&self) -> Stage;
}

/// Composable pipeline builder
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
    context: PipelineContext,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            context: PipelineContext::default(),
        }
    }

    /// The nine segmentation stages in execution order.
    pub fn standard() -> Self {
        Pipeline::new()
            .add_step(Arc::new(ClipStep))
            .add_step(Arc::new(BackgroundStep))
            .add_step(Arc::new(SmoothStep))
            .add_step(Arc::new(ThresholdStep))
            .add_step(Arc::new(ObjectFilterStep))
            .add_step(Arc::new(CenterBlendStep))
            .add_step(Arc::new(MarkerStep))
            .add_step(Arc::new(EdgeMapStep))
            .add_step(Arc::new(WatershedStep))
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let mut entries = std::fs::read_dir(&output_dir).map_err(|source| SegmentError::Io {
                path: output_dir.clone(),
                source,
            })?;
            if entries.next().is_some() {
                return Err(SegmentError::DebugDirNotEmpty(output_dir));
            }
        } else {
            create_dir(&output_dir)?;
        }

        self.context.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Helper method to add a step from a Box (for convenience)
    pub fn add_step_boxed(mut self, step: Box<dyn PipelineStep>) -> Self {
        self.steps.push(Arc::from(step));
        self
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Run every step in order on one frame.
    pub fn run(&self, frame: &Frame, frame_index: usize, params: &ParameterVector) -> Result<FrameArtifacts> {
        let mut data = FrameArtifacts::new(Arc::new(frame.clone()), frame_index);
        self.save_debug_output(&data, Stage::Idle, "input")?;

        for step in &self.steps {
            self.run_step(step.as_ref(), &mut data, params)?;
        }

        Ok(data)
    }

    /// Compute `target` on `data`, running only the stages whose outputs
    /// are missing. Cached upstream outputs are reused as-is.
    pub fn ensure(&self, data: &mut FrameArtifacts, target: Stage, params: &ParameterVector) -> Result<()> {
        if data.has(target) {
            return Ok(());
        }
        for &input in target.inputs() {
            self.ensure(data, input, params)?;
        }
        if let Some(step) = self.steps.iter().find(|s| s.stage() == target) {
            self.run_step(step.as_ref(), data, params)?;
        }
        Ok(())
    }

    fn run_step(&self, step: &dyn PipelineStep, data: &mut FrameArtifacts, params: &ParameterVector) -> Result<()> {
        let start = Instant::now();
        step.process(data, params)?;
        debug!(
            "frame {}: {} took {:.2?}",
            data.frame_index,
            step.name(),
            start.elapsed()
        );
        self.save_debug_output(data, step.stage(), step.name())
    }

    /// Save debug output if debug mode is enabled
    fn save_debug_output(&self, data: &FrameArtifacts, stage: Stage, step_name: &str) -> Result<()> {
        let Some(debug_config) = &self.context.debug else {
            return Ok(());
        };
        let Some(view) = data.view(stage) else {
            return Ok(());
        };

        let step_dir_name = format!(
            "{:02}_{}",
            stage.index(),
            step_name.to_lowercase().replace(' ', "_")
        );
        let step_dir = debug_config.output_dir.join(&step_dir_name);
        create_dir(&step_dir)?;

        let filename = format!("{:04}.png", data.frame_index);
        let output_path = step_dir.join(&filename);
        save_view(view, &output_path)?;

        debug!("saved {}/{}", step_dir_name, filename);
        Ok(())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

fn create_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|source| SegmentError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a stage output as PNG: float images min–max scaled to 8 bits,
/// masks as-is, labels as 16-bit ids.
pub fn save_view(view: StageView<'_>, path: &Path) -> Result<()> {
    let result = match view {
        StageView::Image(frame) => to_display(frame).save(path),
        StageView::Mask(mask) => mask.save(path),
        StageView::Labels(labels) => labels_to_u16(labels).save(path),
    };
    result.map_err(|source| SegmentError::Image {
        path: path.to_path_buf(),
        source,
    })
}

/// Min–max scale a float frame into an 8-bit image.
pub fn to_display(frame: &Frame) -> ImageBuffer<Luma<u8>, Vec<u8>> {
    let (lo, hi) = frame
        .pixels()
        .map(|p| p[0])
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let span = hi - lo;
    let (width, height) = frame.dimensions();
    ImageBuffer::from_fn(width, height, |x, y| {
        let v = frame.get_pixel(x, y)[0];
        let scaled = if span > 0.0 { (v - lo) / span * 255.0 } else { 0.0 };
        Luma([scaled.round().clamp(0.0, 255.0) as u8])
    })
}

pub fn labels_to_u16(labels: &LabelImage) -> ImageBuffer<Luma<u16>, Vec<u16>> {
    let (width, height) = labels.dimensions();
    ImageBuffer::from_fn(width, height, |x, y| {
        Luma([labels.get_pixel(x, y)[0].min(u16::MAX as u32) as u16])
    })
}
