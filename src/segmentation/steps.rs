use crate::error::Result;
use crate::params::ParameterVector;
use crate::pipeline::{FrameArtifacts, PipelineStep, Stage, require};
use crate::segmentation;

/// Cap intensities at the clipping ceiling
pub struct ClipStep;

impl PipelineStep for ClipStep {
    fn process(&self, data: &mut FrameArtifacts, params: &ParameterVector) -> Result<()> {
        data.clipped = Some(segmentation::clip(&data.input, params.clip_limit()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Clipping"
    }

    fn stage(&self) -> Stage {
        Stage::Clip
    }
}

/// Subtract a large-radius blur of the clipped frame
pub struct BackgroundStep;

impl PipelineStep for BackgroundStep {
    fn process(&self, data: &mut FrameArtifacts, params: &ParameterVector) -> Result<()> {
        let clipped = require(&data.clipped, self.name(), "clipped")?;
        data.background_subtracted = Some(segmentation::subtract_background(clipped, params.bg_radius()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Background Subtraction"
    }

    fn stage(&self) -> Stage {
        Stage::Background
    }
}

/// Smooth and renormalise
pub struct SmoothStep;

impl PipelineStep for SmoothStep {
    fn process(&self, data: &mut FrameArtifacts, params: &ParameterVector) -> Result<()> {
        let source = require(&data.background_subtracted, self.name(), "background_subtracted")?;
        data.smoothed = Some(segmentation::smooth(source, params.smooth_radius()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Smoothing"
    }

    fn stage(&self) -> Stage {
        Stage::Smooth
    }
}

/// Binarize the smoothed frame
pub struct ThresholdStep;

impl PipelineStep for ThresholdStep {
    fn process(&self, data: &mut FrameArtifacts, params: &ParameterVector) -> Result<()> {
        let smoothed = require(&data.smoothed, self.name(), "smoothed")?;
        data.thresholded = Some(segmentation::threshold(smoothed, params.threshold()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Threshold"
    }

    fn stage(&self) -> Stage {
        Stage::Threshold
    }
}

/// Remove small connected components
pub struct ObjectFilterStep;

impl PipelineStep for ObjectFilterStep {
    fn process(&self, data: &mut FrameArtifacts, params: &ParameterVector) -> Result<()> {
        let thresholded = require(&data.thresholded, self.name(), "thresholded")?;
        data.mask = Some(segmentation::filter_objects(thresholded, params.min_object_size()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Object Filter"
    }

    fn stage(&self) -> Stage {
        Stage::ObjectFilter
    }
}

/// Distance transform blended with intensity
pub struct CenterBlendStep;

impl PipelineStep for CenterBlendStep {
    fn process(&self, data: &mut FrameArtifacts, params: &ParameterVector) -> Result<()> {
        let smoothed = require(&data.smoothed, self.name(), "smoothed")?;
        let mask = require(&data.mask, self.name(), "mask")?;
        let (distance, centers) = segmentation::center_blend(smoothed, mask, params.center_weight());
        data.distance = Some(distance);
        data.centers = Some(centers);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Center Blend"
    }

    fn stage(&self) -> Stage {
        Stage::CenterBlend
    }
}

/// Seed one marker per local maximum
pub struct MarkerStep;

impl PipelineStep for MarkerStep {
    fn process(&self, data: &mut FrameArtifacts, params: &ParameterVector) -> Result<()> {
        let centers = require(&data.centers, self.name(), "centers")?;
        let mask = require(&data.mask, self.name(), "mask")?;
        data.markers = Some(segmentation::foreground_markers(
            centers,
            mask,
            params.min_separation(),
            params.exclude_border(),
        ));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Markers"
    }

    fn stage(&self) -> Stage {
        Stage::Markers
    }
}

/// Sobel edges of the clipped frame (independent of stages 2-7)
pub struct EdgeMapStep;

impl PipelineStep for EdgeMapStep {
    fn process(&self, data: &mut FrameArtifacts, params: &ParameterVector) -> Result<()> {
        let clipped = require(&data.clipped, self.name(), "clipped")?;
        data.edges = Some(segmentation::edge_map(clipped, params.edge_blur_radius()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Edge Map"
    }

    fn stage(&self) -> Stage {
        Stage::EdgeMap
    }
}

/// Flood from the markers over the edge/distance cost
pub struct WatershedStep;

impl PipelineStep for WatershedStep {
    fn process(&self, data: &mut FrameArtifacts, params: &ParameterVector) -> Result<()> {
        let markers = require(&data.markers, self.name(), "markers")?;
        let mask = require(&data.mask, self.name(), "mask")?;
        let edges = require(&data.edges, self.name(), "edges")?;
        let distance = require(&data.distance, self.name(), "distance")?;
        data.labels = Some(segmentation::watershed_labels(
            markers,
            mask,
            edges,
            distance,
            params.watershed_ratio(),
            params.exclude_border(),
        ));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Watershed"
    }

    fn stage(&self) -> Stage {
        Stage::Watershed
    }
}
