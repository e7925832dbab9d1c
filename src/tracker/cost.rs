//! Overlap statistics and assignment costs between two label masks.

use std::collections::BTreeMap;

use nalgebra::Vector2;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Cost of a pair that is not allowed to match.
pub(crate) const GATED_COST: f64 = 2.0;

/// Highest cost an admissible pair can have.
pub(crate) const MAX_MATCH_COST: f64 = 1.0;

/// How poorly a previous cell matches a next cell.
///
/// Every function yields costs in `[0, 1]` for pairs that overlap by at least
/// the noise floor; other pairs are gated out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CostFunction {
    /// `1 - overlap / max_overlap`.
    #[default]
    Overlap,
    /// `1 - IoU`.
    Iou,
    /// Centroid distance divided by the frame diagonal.
    CentroidDistance,
}

/// Area and centroid of one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellStats {
    pub label: u32,
    pub area: usize,
    pub centroid: Vector2<f64>,
}

/// Per-cell statistics of both masks and their pairwise pixel overlap.
#[derive(Debug, Clone)]
pub struct OverlapTable {
    pub prev: Vec<CellStats>,
    pub next: Vec<CellStats>,
    /// `overlap[[i, j]]` counts pixels labelled `prev[i]` before and
    /// `next[j]` after.
    pub overlap: Array2<usize>,
}

impl OverlapTable {
    /// Collects the table in a single pass over both masks, which must share
    /// a shape.
    pub fn new(prev: &ArrayView2<u32>, next: &ArrayView2<u32>) -> Self {
        let (prev_stats, prev_index) = cell_stats(prev);
        let (next_stats, next_index) = cell_stats(next);

        let mut overlap = Array2::zeros((prev_stats.len(), next_stats.len()));
        for (&p, &n) in prev.iter().zip(next.iter()) {
            if p > 0 && n > 0 {
                overlap[[prev_index[&p], next_index[&n]]] += 1;
            }
        }

        Self {
            prev: prev_stats,
            next: next_stats,
            overlap,
        }
    }

    /// Cost matrix for the solver. Pairs below `min_overlap` get
    /// [`GATED_COST`].
    pub fn cost_matrix(
        &self,
        cost: CostFunction,
        min_overlap: usize,
        shape: (usize, usize),
    ) -> Array2<f64> {
        let max_overlap = self.overlap.iter().copied().max().unwrap_or(0).max(1) as f64;
        let diagonal = Vector2::new(shape.0 as f64, shape.1 as f64).norm().max(1.0);

        Array2::from_shape_fn(self.overlap.dim(), |(i, j)| {
            let o = self.overlap[[i, j]];
            if o < min_overlap {
                return GATED_COST;
            }
            let (p, n) = (&self.prev[i], &self.next[j]);
            match cost {
                CostFunction::Overlap => 1.0 - o as f64 / max_overlap,
                CostFunction::Iou => {
                    let union = (p.area + n.area - o) as f64;
                    1.0 - o as f64 / union
                }
                CostFunction::CentroidDistance => {
                    ((p.centroid - n.centroid).norm() / diagonal).min(1.0)
                }
            }
        })
    }
}

fn cell_stats(mask: &ArrayView2<u32>) -> (Vec<CellStats>, BTreeMap<u32, usize>) {
    let mut sums: BTreeMap<u32, (usize, Vector2<f64>)> = BTreeMap::new();
    for ((r, c), &v) in mask.indexed_iter() {
        if v > 0 {
            let entry = sums.entry(v).or_insert((0, Vector2::zeros()));
            entry.0 += 1;
            entry.1 += Vector2::new(r as f64, c as f64);
        }
    }

    let mut index = BTreeMap::new();
    let stats = sums
        .into_iter()
        .enumerate()
        .map(|(i, (label, (area, sum)))| {
            index.insert(label, i);
            CellStats {
                label,
                area,
                centroid: sum / area as f64,
            }
        })
        .collect();
    (stats, index)
}
