use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use image::Luma;

use crate::models::{BinaryMask, Frame, LabelImage, MarkerImage};

/// Pending pixel in the flooding queue.
///
/// Ordered so the max-heap pops the lowest level first and, among equal
/// levels, the pixel queued earliest.
struct Pending {
    level: f32,
    age: u64,
    index: usize,
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .level
            .total_cmp(&self.level)
            .then_with(|| other.age.cmp(&self.age))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

/// Marker-controlled watershed by priority flooding over 4-neighbours.
///
/// Every marker pixel seeds the queue with its own cost. Unlabeled pixels
/// are claimed by the first label whose front reaches them and are queued
/// at their own cost. When `mask` is given, flooding never enters pixels
/// outside it; such pixels keep their marker value (usually 0).
pub fn watershed(cost: &Frame, markers: &MarkerImage, mask: Option<&BinaryMask>) -> LabelImage {
    let (width, height) = cost.dimensions();
    let (w, h) = (width as usize, height as usize);
    let levels = cost.as_raw();
    let mut labels: Vec<u32> = markers.as_raw().clone();
    let allowed = |i: usize| mask.is_none_or(|m| m.as_raw()[i] != 0);

    let mut queue = BinaryHeap::new();
    let mut age = 0u64;
    for (index, &label) in labels.iter().enumerate() {
        if label != 0 {
            queue.push(Pending {
                level: levels[index],
                age,
                index,
            });
            age += 1;
        }
    }

    while let Some(Pending { index, .. }) = queue.pop() {
        let label = labels[index];
        let (x, y) = (index % w, index / w);

        let mut neighbours = [None; 4];
        if x > 0 {
            neighbours[0] = Some(index - 1);
        }
        if x + 1 < w {
            neighbours[1] = Some(index + 1);
        }
        if y > 0 {
            neighbours[2] = Some(index - w);
        }
        if y + 1 < h {
            neighbours[3] = Some(index + w);
        }

        for n in neighbours.into_iter().flatten() {
            if labels[n] != 0 || !allowed(n) {
                continue;
            }
            labels[n] = label;
            queue.push(Pending {
                level: levels[n],
                age,
                index: n,
            });
            age += 1;
        }
    }

    LabelImage::from_raw(width, height, labels).unwrap_or_else(|| markers.clone())
}

/// Label ids present on any of the four image edges.
pub fn border_labels(labels: &LabelImage) -> BTreeSet<u32> {
    let (width, height) = labels.dimensions();
    let mut touching = BTreeSet::new();
    if width == 0 || height == 0 {
        return touching;
    }
    for x in 0..width {
        touching.insert(labels.get_pixel(x, 0)[0]);
        touching.insert(labels.get_pixel(x, height - 1)[0]);
    }
    for y in 0..height {
        touching.insert(labels.get_pixel(0, y)[0]);
        touching.insert(labels.get_pixel(width - 1, y)[0]);
    }
    touching.remove(&0);
    touching
}

/// Zero every object that touches the image edge.
pub fn clear_border(labels: &mut LabelImage) -> usize {
    let touching = border_labels(labels);
    if touching.is_empty() {
        return 0;
    }
    for p in labels.pixels_mut() {
        if touching.contains(&p[0]) {
            *p = Luma([0]);
        }
    }
    touching.len()
}

/// Renumber labels to 1..=n, preserving their relative order.
pub fn relabel_sequential(labels: &mut LabelImage) -> u32 {
    let present: BTreeSet<u32> = labels.pixels().map(|p| p[0]).filter(|&l| l != 0).collect();
    let mapping: BTreeMap<u32, u32> = present.into_iter().zip(1..).collect();
    for p in labels.pixels_mut() {
        if let Some(&id) = mapping.get(&p[0]) {
            p[0] = id;
        }
    }
    mapping.len() as u32
}
