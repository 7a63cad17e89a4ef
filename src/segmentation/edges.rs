use image::Luma;

use crate::models::Frame;
use crate::segmentation::blur;

/// Sobel gradient magnitude, `sqrt((gx² + gy²) / 2)` with kernels scaled by
/// 1/4. The one-pixel border has no full neighbourhood and is set to zero.
pub fn sobel(image: &Frame) -> Frame {
    let (width, height) = image.dimensions();
    let mut out = Frame::new(width, height);
    if width < 3 || height < 3 {
        return out;
    }

    let at = |x: u32, y: u32| image.get_pixel(x, y)[0];
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let gx = (at(x + 1, y - 1) + 2.0 * at(x + 1, y) + at(x + 1, y + 1)
                - at(x - 1, y - 1)
                - 2.0 * at(x - 1, y)
                - at(x - 1, y + 1))
                / 4.0;
            let gy = (at(x - 1, y + 1) + 2.0 * at(x, y + 1) + at(x + 1, y + 1)
                - at(x - 1, y - 1)
                - 2.0 * at(x, y - 1)
                - at(x + 1, y - 1))
                / 4.0;
            out.put_pixel(x, y, Luma([((gx * gx + gy * gy) / 2.0).sqrt()]));
        }
    }
    out
}

/// Edge cost image: smooth the clipped frame, take the Sobel magnitude,
/// add one and renormalise to (0, 1].
pub fn edge_map(clipped: &Frame, blur_radius: f32) -> Frame {
    let smoothed = blur::smooth(clipped, blur_radius);
    let mut edges = sobel(&smoothed);
    for p in edges.pixels_mut() {
        p[0] += 1.0;
    }
    blur::normalize_by_max(&mut edges);
    edges
}
