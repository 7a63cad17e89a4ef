use image::Luma;
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::models::{BinaryMask, FOREGROUND, Frame, MarkerImage};

/// Local maxima of `image` inside `mask`, at least `min_distance` pixels
/// apart (Chebyshev distance), in raster order.
///
/// A pixel is a candidate when it equals the maximum of its
/// `(2 * min_distance + 1)` square window and lies strictly above the image
/// floor. Candidates are accepted from highest to lowest, ties broken in
/// raster order, and each accepted peak suppresses every later candidate
/// within `min_distance` of it, so a plateau yields a single peak.
pub fn find_peaks(
    image: &Frame,
    mask: &BinaryMask,
    min_distance: u32,
    exclude_border: bool,
) -> Vec<(u32, u32)> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let floor = image.pixels().map(|p| p[0]).fold(f32::INFINITY, f32::min);
    let window_max = max_filter(image, min_distance as usize);
    let on_border = |x: u32, y: u32| x == 0 || y == 0 || x == width - 1 || y == height - 1;

    let mut candidates: Vec<(f32, u32, u32)> = Vec::new();
    for (x, y, p) in image.enumerate_pixels() {
        let value = p[0];
        if mask.get_pixel(x, y)[0] == 0 || value <= floor {
            continue;
        }
        if value < window_max.get_pixel(x, y)[0] {
            continue;
        }
        if exclude_border && on_border(x, y) {
            continue;
        }
        candidates.push((value, x, y));
    }

    // Stable sort keeps raster order among equal values.
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

    let d = min_distance as i64;
    let mut suppressed = BinaryMask::new(width, height);
    let mut peaks = Vec::new();
    for (_, x, y) in candidates {
        if suppressed.get_pixel(x, y)[0] != 0 {
            continue;
        }
        peaks.push((x, y));

        let (x0, x1) = ((x as i64 - d).max(0), (x as i64 + d).min(width as i64 - 1));
        let (y0, y1) = ((y as i64 - d).max(0), (y as i64 + d).min(height as i64 - 1));
        for sy in y0..=y1 {
            for sx in x0..=x1 {
                suppressed.put_pixel(sx as u32, sy as u32, Luma([FOREGROUND]));
            }
        }
    }

    peaks.sort_by_key(|&(x, y)| (y, x));
    peaks
}

/// Give each 4-connected group of peaks its own positive id.
pub fn label_peaks(peaks: &[(u32, u32)], width: u32, height: u32) -> MarkerImage {
    let mut seeds = BinaryMask::new(width, height);
    for &(x, y) in peaks {
        seeds.put_pixel(x, y, Luma([FOREGROUND]));
    }
    connected_components(&seeds, Connectivity::Four, Luma([0u8]))
}

/// Separable maximum filter over a `(2 * radius + 1)` square, clipped to
/// the image bounds.
fn max_filter(image: &Frame, radius: usize) -> Frame {
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);
    let src = image.as_raw();

    let mut rows = vec![0.0f32; w * h];
    for y in 0..h {
        let line = &src[y * w..(y + 1) * w];
        for x in 0..w {
            let lo = x.saturating_sub(radius);
            let hi = (x + radius).min(w - 1);
            rows[y * w + x] = line[lo..=hi].iter().copied().fold(f32::NEG_INFINITY, f32::max);
        }
    }

    let mut out = vec![0.0f32; w * h];
    for x in 0..w {
        for y in 0..h {
            let lo = y.saturating_sub(radius);
            let hi = (y + radius).min(h - 1);
            out[y * w + x] = (lo..=hi)
                .map(|yy| rows[yy * w + x])
                .fold(f32::NEG_INFINITY, f32::max);
        }
    }

    Frame::from_raw(width, height, out).unwrap_or_else(|| image.clone())
}
