use std::collections::BTreeSet;

use image::Luma;
use nucleiseg::{Frame, LabelImage, ParameterVector, Stack};

/// Gaussian intensity bump: centre x, centre y, sigma, peak height.
#[derive(Debug, Clone, Copy)]
pub struct Bump {
    pub x: f32,
    pub y: f32,
    pub sigma: f32,
    pub peak: f32,
}

pub const fn bump(x: f32, y: f32, sigma: f32, peak: f32) -> Bump {
    Bump { x, y, sigma, peak }
}

/// Zero frame with the given bumps summed in.
pub fn bump_frame(width: u32, height: u32, bumps: &[Bump]) -> Frame {
    Frame::from_fn(width, height, |x, y| {
        let v: f32 = bumps
            .iter()
            .map(|b| {
                let dx = x as f32 - b.x;
                let dy = y as f32 - b.y;
                b.peak * (-(dx * dx + dy * dy) / (2.0 * b.sigma * b.sigma)).exp()
            })
            .sum();
        Luma([v])
    })
}

/// The 20x20 single-nucleus frame: one bump of peak 1.0 at the centre.
pub fn single_nucleus_frame() -> Frame {
    bump_frame(20, 20, &[bump(10.0, 10.0, 2.5, 1.0)])
}

/// Two separate nuclei, 20 pixels apart on the same row.
pub fn two_nuclei_frame() -> Frame {
    bump_frame(
        48,
        24,
        &[bump(12.0, 12.0, 2.5, 1.0), bump(32.0, 12.0, 2.5, 0.9)],
    )
}

/// Clip 0, background 0, smooth 0, threshold 0.3, min size 1, centre weight
/// 0.5, separation 5, edge blur 0, ratio 0.5, keep border objects.
pub fn bump_params() -> ParameterVector {
    ParameterVector::new([0.0, 0.0, 0.0, 0.3, 1.0, 0.5, 5.0, 0.0, 0.5, 0.0])
        .expect("valid parameters")
}

/// A stack whose frames drift a bump across the field of view.
pub fn drifting_stack(frames: usize) -> Stack {
    let frames = (0..frames)
        .map(|i| {
            let shift = i as f32 * 1.5;
            bump_frame(
                40,
                32,
                &[
                    bump(10.0 + shift, 12.0, 2.5, 1.0),
                    bump(28.0, 20.0 - shift * 0.5, 3.0, 0.8),
                ],
            )
        })
        .collect();
    Stack::new(frames).expect("frames share a shape")
}

/// Distinct non-zero ids in a label image.
pub fn label_ids(labels: &LabelImage) -> BTreeSet<u32> {
    labels.pixels().map(|p| p[0]).filter(|&l| l != 0).collect()
}

pub fn assert_close(a: f32, b: f32, tolerance: f32) {
    assert!((a - b).abs() <= tolerance, "{a} differs from {b} by more than {tolerance}");
}
