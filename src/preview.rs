use std::sync::Arc;

use log::debug;

use crate::error::{Result, SegmentError};
use crate::models::Frame;
use crate::params::{Param, ParameterVector};
use crate::pipeline::{FrameArtifacts, Pipeline, Stage, StageView};
use crate::segmentation;

/// Interactive tuning session over one frame.
///
/// Every stage output is cached. An edit tagged with stage `s` invalidates
/// `s` and everything downstream of it, then recomputes only what is
/// missing, so upstream stages are never rerun.
pub struct PreviewController {
    pipeline: Pipeline,
    params: ParameterVector,
    artifacts: FrameArtifacts,
    state: Stage,
}

impl PreviewController {
    pub fn new(frame: Frame, params: ParameterVector) -> Self {
        Self {
            pipeline: Pipeline::standard(),
            params,
            artifacts: FrameArtifacts::new(Arc::new(frame), 0),
            state: Stage::Idle,
        }
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Swap the frame under preview. All cached outputs belong to the old
    /// frame and are dropped; the session returns to the idle state.
    pub fn select_frame(&mut self, frame: Frame, frame_index: usize) {
        self.artifacts = FrameArtifacts::new(Arc::new(frame), frame_index);
        self.state = Stage::Idle;
    }

    pub fn state(&self) -> Stage {
        self.state
    }

    pub fn params(&self) -> &ParameterVector {
        &self.params
    }

    /// Set the parameter bound to `stage` and recompute the affected suffix.
    ///
    /// Returns the output of the last stage recomputed: the edge map for
    /// [`Stage::EdgeMap`], the label image otherwise. An invalid value
    /// leaves the session untouched.
    pub fn apply_edit(&mut self, stage: Stage, value: f32) -> Result<StageView<'_>> {
        let Some(param) = stage.param() else {
            self.state = Stage::Idle;
            return Ok(StageView::Image(&self.artifacts.input));
        };
        self.params.set(param, value)?;
        self.artifacts.invalidate(stage);

        let target = if stage == Stage::EdgeMap {
            Stage::EdgeMap
        } else {
            // The edge branch is rerun on every edit, not only on clip edits.
            self.artifacts.invalidate(Stage::EdgeMap);
            Stage::Watershed
        };

        debug!("preview edit: stage {} {} = {}", stage.index(), param.name(), value);
        self.pipeline.ensure(&mut self.artifacts, target, &self.params)?;
        self.state = stage;
        self.output(target)
    }

    /// [`apply_edit`](Self::apply_edit) for callers holding a numeric stage tag.
    pub fn apply_edit_tagged(&mut self, stage: u8, value: f32) -> Result<StageView<'_>> {
        self.apply_edit(Stage::try_from(stage)?, value)
    }

    /// Toggle border exclusion, which affects markers and the watershed.
    pub fn set_exclude_border(&mut self, exclude: bool) -> Result<StageView<'_>> {
        self.params
            .set(Param::ExcludeBorder, if exclude { 1.0 } else { 0.0 })?;
        self.artifacts.invalidate(Stage::Markers);
        self.artifacts.invalidate(Stage::EdgeMap);
        self.pipeline
            .ensure(&mut self.artifacts, Stage::Watershed, &self.params)?;
        self.state = Stage::Watershed;
        self.output(Stage::Watershed)
    }

    /// Cached output of any stage, `None` if it has not been computed since
    /// the last invalidation.
    pub fn stage_output(&self, stage: Stage) -> Option<StageView<'_>> {
        self.artifacts.view(stage)
    }

    /// Blend image with the marker footprints raised by one.
    pub fn marker_overlay(&self) -> Option<Frame> {
        let centers = self.artifacts.centers.as_ref()?;
        let markers = self.artifacts.markers.as_ref()?;
        Some(segmentation::marker_overlay(centers, markers))
    }

    pub fn artifacts(&self) -> &FrameArtifacts {
        &self.artifacts
    }

    /// End the session and hand back the tuned parameters for persistence.
    pub fn commit(self) -> ParameterVector {
        self.params
    }

    fn output(&self, stage: Stage) -> Result<StageView<'_>> {
        self.artifacts
            .view(stage)
            .ok_or(SegmentError::MissingArtifact {
                stage: "preview",
                artifact: "stage output",
            })
    }
}
