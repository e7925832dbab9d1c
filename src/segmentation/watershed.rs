//! Seeded watershed instance segmentation of a binary cell mask.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::debug;
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::labels::{Connectivity, LabelMask, connected_components, ensure_same_shape};
use crate::segmentation::merge::{MergeConfig, merge_oversegmentation};

/// Squared distance standing in for "no background seen yet".
const FAR: f64 = 1e20;

/// Parameters of the watershed split and the merge that follows it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Minimum Chebyshev spacing between two watershed seeds.
    pub min_distance: usize,
    /// Drop seeds closer than `min_distance` to the frame edge.
    pub exclude_border: bool,
    pub merge: MergeConfig,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            min_distance: 5,
            exclude_border: true,
            merge: MergeConfig::default(),
        }
    }
}

impl SegmentConfig {
    pub fn with_min_distance(mut self, min_distance: usize) -> Self {
        self.min_distance = min_distance;
        self
    }

    pub fn with_exclude_border(mut self, exclude_border: bool) -> Self {
        self.exclude_border = exclude_border;
        self
    }

    pub fn with_merge(mut self, merge: MergeConfig) -> Self {
        self.merge = merge;
        self
    }
}

/// Splits a binary mask into cells and merges over-split neighbours back.
///
/// Seeds are the spaced maxima of the distance transform; the watershed floods
/// the negated distance inside the mask with 8-connectivity.
pub fn segment(
    binary: ArrayView2<bool>,
    probability: ArrayView2<f32>,
    config: &SegmentConfig,
) -> Result<LabelMask> {
    ensure_same_shape(&binary, &probability)?;

    let distance = distance_transform_edt(&binary);
    let peaks = peak_local_max(&distance.view(), config.min_distance, config.exclude_border);

    let mut seeds = Array2::from_elem(binary.dim(), false);
    for &px in &peaks {
        seeds[px] = true;
    }
    let (markers, count) = connected_components(&seeds.view(), Connectivity::Eight);
    debug!("watershed with {count} seeds");

    let surface = distance.mapv(|d| -d);
    let split = watershed(surface.view(), markers.view(), binary)?;
    merge_oversegmentation(split.view(), probability, &config.merge)
}

/// Euclidean distance of every foreground pixel to the nearest background
/// pixel. Background pixels are `0`.
pub fn distance_transform_edt(binary: &ArrayView2<bool>) -> Array2<f64> {
    let mut squared = binary.mapv(|fg| if fg { FAR } else { 0.0 });
    for axis in [Axis(0), Axis(1)] {
        for mut lane in squared.lanes_mut(axis) {
            let f: Vec<f64> = lane.iter().copied().collect();
            for (dst, d) in lane.iter_mut().zip(squared_edt_1d(&f)) {
                *dst = d;
            }
        }
    }
    squared.mapv(f64::sqrt)
}

/// Felzenszwalb-Huttenlocher lower envelope of parabolas.
fn squared_edt_1d(f: &[f64]) -> Vec<f64> {
    let n = f.len();
    if n == 0 {
        return Vec::new();
    }
    let mut v = vec![0usize; n];
    let mut z = vec![0.0f64; n + 1];
    z[0] = f64::NEG_INFINITY;
    z[1] = f64::INFINITY;

    let intersect = |q: usize, p: usize| {
        let (qf, pf) = (q as f64, p as f64);
        ((f[q] + qf * qf) - (f[p] + pf * pf)) / (2.0 * qf - 2.0 * pf)
    };

    let mut k = 0;
    for q in 1..n {
        let mut s = intersect(q, v[k]);
        while s <= z[k] {
            k -= 1;
            s = intersect(q, v[k]);
        }
        k += 1;
        v[k] = q;
        z[k] = s;
        z[k + 1] = f64::INFINITY;
    }

    let mut out = vec![0.0; n];
    k = 0;
    for (q, d) in out.iter_mut().enumerate() {
        while z[k + 1] < q as f64 {
            k += 1;
        }
        let dq = q as f64 - v[k] as f64;
        *d = dq * dq + f[v[k]];
    }
    out
}

/// Local maxima of `surface` strictly above its minimum, at least
/// `min_distance + 1` apart in Chebyshev distance. Brighter peaks win.
pub fn peak_local_max(
    surface: &ArrayView2<f64>,
    min_distance: usize,
    exclude_border: bool,
) -> Vec<(usize, usize)> {
    let (height, width) = surface.dim();
    let Some(floor) = surface.iter().copied().reduce(f64::min) else {
        return Vec::new();
    };
    let window_max = max_filter(surface, min_distance);

    let inside = |(r, c): (usize, usize)| {
        !exclude_border
            || (r >= min_distance
                && c >= min_distance
                && r + min_distance < height
                && c + min_distance < width)
    };

    let mut candidates: Vec<((usize, usize), f64)> = surface
        .indexed_iter()
        .filter(|&(px, &v)| v > floor && v == window_max[px] && inside(px))
        .map(|(px, &v)| (px, v))
        .collect();
    // Stable sort keeps raster order among equal heights.
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut peaks: Vec<(usize, usize)> = Vec::new();
    for (px, _) in candidates {
        let spaced = peaks
            .iter()
            .all(|&(r, c)| r.abs_diff(px.0).max(c.abs_diff(px.1)) > min_distance);
        if spaced {
            peaks.push(px);
        }
    }
    peaks
}

/// Separable maximum filter over a `(2 * radius + 1)` square window.
fn max_filter(surface: &ArrayView2<f64>, radius: usize) -> Array2<f64> {
    let mut out = surface.to_owned();
    for axis in [Axis(0), Axis(1)] {
        for mut lane in out.lanes_mut(axis) {
            let src: Vec<f64> = lane.iter().copied().collect();
            for (i, dst) in lane.iter_mut().enumerate() {
                let lo = i.saturating_sub(radius);
                let hi = (i + radius + 1).min(src.len());
                *dst = src[lo..hi].iter().copied().fold(f64::NEG_INFINITY, f64::max);
            }
        }
    }
    out
}

#[derive(Debug)]
struct FloodEntry {
    value: f64,
    age: u64,
    px: (usize, usize),
}

impl PartialEq for FloodEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FloodEntry {}

impl PartialOrd for FloodEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloodEntry {
    // Reversed so the max-heap pops the lowest, oldest entry first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .value
            .total_cmp(&self.value)
            .then_with(|| other.age.cmp(&self.age))
    }
}

/// Marker-based watershed of `surface`, restricted to `mask`.
///
/// Mask pixels that no marker can reach stay background.
pub fn watershed(
    surface: ArrayView2<f64>,
    markers: ArrayView2<u32>,
    mask: ArrayView2<bool>,
) -> Result<LabelMask> {
    ensure_same_shape(&surface, &markers)?;
    ensure_same_shape(&surface, &mask)?;

    let shape = surface.dim();
    let mut labels = LabelMask::zeros(shape);
    let mut heap = BinaryHeap::new();
    let mut age = 0u64;

    for (px, &m) in markers.indexed_iter() {
        if m > 0 && mask[px] {
            labels[px] = m;
            heap.push(FloodEntry {
                value: surface[px],
                age,
                px,
            });
            age += 1;
        }
    }

    while let Some(FloodEntry { px, .. }) = heap.pop() {
        let label = labels[px];
        for n in Connectivity::Eight.neighbours(px, shape) {
            if mask[n] && labels[n] == 0 {
                labels[n] = label;
                heap.push(FloodEntry {
                    value: surface[n],
                    age,
                    px: n,
                });
                age += 1;
            }
        }
    }

    Ok(labels)
}
