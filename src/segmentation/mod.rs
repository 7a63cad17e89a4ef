pub mod blur;
pub mod edges;
pub mod morphology;
pub mod peaks;
pub mod steps;
pub mod watershed;

use image::Luma;

use crate::error::Result;
use crate::models::{BinaryMask, DistanceMap, FOREGROUND, Frame, LabelImage, MarkerImage};
use crate::params::ParameterVector;
use crate::pipeline::Pipeline;

/// Segment one frame into a label image.
///
/// Pure function of `(frame, params)`: no state survives between calls.
pub fn segment_frame(frame: &Frame, params: &ParameterVector) -> Result<LabelImage> {
    Pipeline::standard()
        .run(frame, 0, params)?
        .into_labels()
}

/// Stage 1: cap intensities at `limit`. `None` copies the frame unchanged.
pub fn clip(frame: &Frame, limit: Option<f32>) -> Frame {
    let mut out = frame.clone();
    if let Some(limit) = limit {
        for p in out.pixels_mut() {
            if p[0] > limit {
                p[0] = limit;
            }
        }
    }
    out
}

/// Stage 2: remove slow illumination gradients by subtracting a large-radius
/// blur of the frame from itself.
pub fn subtract_background(frame: &Frame, radius: f32) -> Frame {
    if radius <= 0.0 {
        return frame.clone();
    }
    let background = blur::smooth(frame, radius);
    let mut out = frame.clone();
    for (p, b) in out.pixels_mut().zip(background.pixels()) {
        p[0] -= b[0];
    }
    out
}

/// Stage 3: smooth and renormalise by the maximum.
pub fn smooth(frame: &Frame, radius: f32) -> Frame {
    blur::blur(frame, radius)
}

/// Stage 4: foreground iff intensity is strictly above `cutoff`.
pub fn threshold(frame: &Frame, cutoff: f32) -> BinaryMask {
    let (width, height) = frame.dimensions();
    BinaryMask::from_fn(width, height, |x, y| {
        Luma([if frame.get_pixel(x, y)[0] > cutoff { FOREGROUND } else { 0 }])
    })
}

/// Stage 5: drop foreground components smaller than `min_size` pixels.
pub fn filter_objects(mask: &BinaryMask, min_size: usize) -> BinaryMask {
    morphology::remove_small_objects(mask, min_size)
}

/// Stage 6: blend intensity with normalised distance-to-background.
///
/// Returns the distance map and `(1 - weight) * smoothed + weight * distance`,
/// zeroed outside the mask.
pub fn center_blend(smoothed: &Frame, mask: &BinaryMask, weight: f32) -> (DistanceMap, Frame) {
    let distance = morphology::distance_transform(mask);
    let (width, height) = smoothed.dimensions();
    let centers = Frame::from_fn(width, height, |x, y| {
        if mask.get_pixel(x, y)[0] == 0 {
            Luma([0.0])
        } else {
            let s = smoothed.get_pixel(x, y)[0];
            let d = distance.get_pixel(x, y)[0];
            Luma([(1.0 - weight) * s + weight * d])
        }
    });
    (distance, centers)
}

/// Stage 7: one seed per local maximum of the blend image, each dilated to a
/// small footprint.
pub fn foreground_markers(
    centers: &Frame,
    mask: &BinaryMask,
    min_separation: u32,
    exclude_border: bool,
) -> MarkerImage {
    let (width, height) = centers.dimensions();
    let peaks = peaks::find_peaks(centers, mask, min_separation, exclude_border);
    let seeds = peaks::label_peaks(&peaks, width, height);
    morphology::dilate_labels(&seeds, &morphology::seed_footprint())
}

/// Stage 8: Sobel edge cost of the clipped frame.
pub fn edge_map(clipped: &Frame, blur_radius: f32) -> Frame {
    edges::edge_map(clipped, blur_radius)
}

/// Label reserved for the synthetic background seed during flooding.
const BACKGROUND_SEED: u32 = 1;

/// Stage 9: marker-controlled watershed.
///
/// The mask is dilated twice to bound where objects may grow; everything
/// outside becomes one synthetic background seed with the lowest id. After
/// flooding the cost `(1 - ratio) * edges - ratio * distance`, ids shift down
/// by one so background is 0. With `exclude_border`, objects touching an
/// image edge are removed. Surviving objects are numbered 1..=n.
pub fn watershed_labels(
    markers: &MarkerImage,
    mask: &BinaryMask,
    edges: &Frame,
    distance: &DistanceMap,
    ratio: f32,
    exclude_border: bool,
) -> LabelImage {
    let (width, height) = mask.dimensions();
    let footprint = morphology::seed_footprint();
    let reach = morphology::dilate_mask(&morphology::dilate_mask(mask, &footprint), &footprint);

    let seeds = MarkerImage::from_fn(width, height, |x, y| {
        if reach.get_pixel(x, y)[0] == 0 {
            Luma([BACKGROUND_SEED])
        } else {
            match markers.get_pixel(x, y)[0] {
                0 => Luma([0]),
                id => Luma([id + BACKGROUND_SEED]),
            }
        }
    });

    let cost = Frame::from_fn(width, height, |x, y| {
        let e = edges.get_pixel(x, y)[0];
        let d = distance.get_pixel(x, y)[0];
        Luma([(1.0 - ratio) * e - ratio * d])
    });

    let mut labels = watershed::watershed(&cost, &seeds, Some(&reach));
    for p in labels.pixels_mut() {
        p[0] = p[0].saturating_sub(BACKGROUND_SEED);
    }

    if exclude_border {
        watershed::clear_border(&mut labels);
    }
    watershed::relabel_sequential(&mut labels);
    labels
}

/// Blend image with seed footprints raised by one, for previewing markers.
pub fn marker_overlay(centers: &Frame, markers: &MarkerImage) -> Frame {
    let (width, height) = centers.dimensions();
    Frame::from_fn(width, height, |x, y| {
        let bump = if markers.get_pixel(x, y)[0] > 0 { 1.0 } else { 0.0 };
        Luma([centers.get_pixel(x, y)[0] + bump])
    })
}
