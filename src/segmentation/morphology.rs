use std::collections::HashMap;

use image::Luma;
use imageproc::distance_transform::euclidean_squared_distance_transform;
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::models::{BinaryMask, DistanceMap, FOREGROUND, MarkerImage};

/// Set of pixel offsets a morphological operator visits around each pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footprint {
    offsets: Vec<(i32, i32)>,
}

impl Footprint {
    /// Square with its corners cut: the discrete octagon of the given radius.
    pub fn octagon(radius: u32) -> Self {
        let r = radius as i32;
        let cut = r + r / 2;
        let mut offsets = Vec::new();
        for dy in -r..=r {
            for dx in -r..=r {
                if dx.abs() + dy.abs() <= cut {
                    offsets.push((dx, dy));
                }
            }
        }
        Self { offsets }
    }

    pub fn offsets(&self) -> &[(i32, i32)] {
        &self.offsets
    }

    fn neighbours(
        &self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.offsets.iter().filter_map(move |&(dx, dy)| {
            let nx = x as i64 + dx as i64;
            let ny = y as i64 + dy as i64;
            if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                None
            } else {
                Some((nx as u32, ny as u32))
            }
        })
    }
}

/// Seed footprint and the per-pass step of the background-exclusion dilation.
pub fn seed_footprint() -> Footprint {
    Footprint::octagon(2)
}

/// Binary dilation: a pixel is set if any footprint neighbour is set.
pub fn dilate_mask(mask: &BinaryMask, footprint: &Footprint) -> BinaryMask {
    let (width, height) = mask.dimensions();
    BinaryMask::from_fn(width, height, |x, y| {
        let hit = footprint
            .neighbours(x, y, width, height)
            .any(|(nx, ny)| mask.get_pixel(nx, ny)[0] != 0);
        Luma([if hit { FOREGROUND } else { 0 }])
    })
}

/// Grey dilation of a label image: every pixel takes the largest label in
/// its footprint.
pub fn dilate_labels(labels: &MarkerImage, footprint: &Footprint) -> MarkerImage {
    let (width, height) = labels.dimensions();
    MarkerImage::from_fn(width, height, |x, y| {
        let max = footprint
            .neighbours(x, y, width, height)
            .map(|(nx, ny)| labels.get_pixel(nx, ny)[0])
            .max()
            .unwrap_or(0);
        Luma([max])
    })
}

/// Drop 8-connected foreground components with fewer than `min_size` pixels.
pub fn remove_small_objects(mask: &BinaryMask, min_size: usize) -> BinaryMask {
    if min_size == 0 {
        return mask.clone();
    }

    let labeled = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    let mut sizes: HashMap<u32, usize> = HashMap::new();
    for label in labeled.pixels() {
        if label[0] != 0 {
            *sizes.entry(label[0]).or_insert(0) += 1;
        }
    }

    let (width, height) = mask.dimensions();
    BinaryMask::from_fn(width, height, |x, y| {
        let label = labeled.get_pixel(x, y)[0];
        let keep = label != 0 && sizes.get(&label).copied().unwrap_or(0) >= min_size;
        Luma([if keep { FOREGROUND } else { 0 }])
    })
}

/// Euclidean distance of each foreground pixel to the nearest background
/// pixel, divided by the largest such distance.
///
/// An empty mask yields all zeros; a mask with no background pixel at all
/// yields ones on every pixel.
pub fn distance_transform(mask: &BinaryMask) -> DistanceMap {
    let (width, height) = mask.dimensions();
    let has_background = mask.pixels().any(|p| p[0] == 0);
    let has_foreground = mask.pixels().any(|p| p[0] != 0);

    if !has_foreground {
        return DistanceMap::new(width, height);
    }
    if !has_background {
        return DistanceMap::from_pixel(width, height, Luma([1.0]));
    }

    // The transform measures distance to the nearest non-zero pixel, so
    // background pixels are the ones marked.
    let background = BinaryMask::from_fn(width, height, |x, y| {
        Luma([if mask.get_pixel(x, y)[0] == 0 { FOREGROUND } else { 0 }])
    });
    let squared = euclidean_squared_distance_transform(&background);

    let max = squared.pixels().map(|p| p[0]).fold(0.0f64, f64::max).sqrt();
    DistanceMap::from_fn(width, height, |x, y| {
        if mask.get_pixel(x, y)[0] == 0 || max <= 0.0 {
            Luma([0.0])
        } else {
            Luma([(squared.get_pixel(x, y)[0].sqrt() / max) as f32])
        }
    })
}

pub fn count_foreground(mask: &BinaryMask) -> usize {
    mask.pixels().filter(|p| p[0] != 0).count()
}
