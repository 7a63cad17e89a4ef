use imageproc::filter::gaussian_blur_f32;
use log::debug;

use crate::models::Frame;

/// Radii below this use an exact Gaussian, radii at or above it use
/// repeated box blurs.
pub const BOX_BLUR_CROSSOVER: f32 = 8.0;

/// Three box passes approximate a Gaussian closely enough.
const BOX_PASSES: usize = 3;

/// Smooth a frame at the given radius without renormalising.
///
/// A radius of zero (or below) returns an unchanged copy.
pub fn smooth(frame: &Frame, radius: f32) -> Frame {
    if radius <= 0.0 {
        return frame.clone();
    }
    if radius < BOX_BLUR_CROSSOVER {
        gaussian_blur_f32(frame, radius)
    } else {
        box_blur(frame, box_half_width(radius), BOX_PASSES)
    }
}

/// Smooth a frame and divide the result by its own maximum.
pub fn blur(frame: &Frame, radius: f32) -> Frame {
    let mut out = smooth(frame, radius);
    normalize_by_max(&mut out);
    out
}

/// Divide every pixel by the frame maximum.
///
/// A non-positive maximum means the frame is already normalised; nothing is
/// divided and `false` is returned.
pub fn normalize_by_max(frame: &mut Frame) -> bool {
    let max = frame.pixels().map(|p| p[0]).fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() || max <= 0.0 {
        debug!("skipping renormalisation, frame maximum is {max}");
        return false;
    }
    for p in frame.pixels_mut() {
        p[0] /= max;
    }
    true
}

fn box_half_width(radius: f32) -> usize {
    ((radius / 2.0).round() as usize).max(1)
}

/// Separable box blur, repeated `passes` times, clamping at the edges.
pub fn box_blur(frame: &Frame, half_width: usize, passes: usize) -> Frame {
    let (width, height) = frame.dimensions();
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 {
        return frame.clone();
    }
    let mut data = frame.as_raw().clone();

    let mut line = vec![0.0f32; w.max(h)];
    let mut out = vec![0.0f32; w.max(h)];

    for _ in 0..passes {
        for y in 0..h {
            let row = &mut data[y * w..(y + 1) * w];
            line[..w].copy_from_slice(row);
            blur_line(&line[..w], half_width, &mut out[..w]);
            row.copy_from_slice(&out[..w]);
        }
        for x in 0..w {
            for y in 0..h {
                line[y] = data[y * w + x];
            }
            blur_line(&line[..h], half_width, &mut out[..h]);
            for y in 0..h {
                data[y * w + x] = out[y];
            }
        }
    }

    Frame::from_raw(width, height, data).unwrap_or_else(|| frame.clone())
}

/// Running-sum mean over a window of `2 * r + 1` samples.
fn blur_line(line: &[f32], r: usize, out: &mut [f32]) {
    let n = line.len() as isize;
    let r = r as isize;
    let at = |i: isize| line[i.clamp(0, n - 1) as usize] as f64;
    let norm = 1.0 / (2 * r + 1) as f64;

    let mut acc: f64 = (-r..=r).map(at).sum();
    for i in 0..n {
        out[i as usize] = (acc * norm) as f32;
        acc += at(i + r + 1) - at(i - r);
    }
}
