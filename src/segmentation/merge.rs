//! Merging of watershed regions that were split across a predicted cell interior.

use log::debug;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::error::{CellTrackError, Result};
use crate::labels::{LabelMask, ensure_same_shape, label_pixels, relabel_sequential};
use crate::segmentation::artefacts::correct_artefacts;
use crate::segmentation::region::CandidateRegion;

/// Decision constants of the region merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Borders with fewer pixels than this are never merged across.
    pub min_border_pixels: usize,
    /// A pair merges when its top-quantile border mean is strictly above this.
    pub merge_threshold: f32,
    /// Safety margin of the bounding box pre-filter.
    pub box_margin: usize,
    /// Regions of at most this many pixels are folded into a neighbour.
    pub max_fragment_size: usize,
    /// Quantile above which border pixels are averaged.
    pub top_quantile: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            min_border_pixels: 16,
            merge_threshold: 0.99,
            box_margin: 2,
            max_fragment_size: 3,
            top_quantile: 0.75,
        }
    }
}

impl MergeConfig {
    pub fn with_min_border_pixels(mut self, pixels: usize) -> Self {
        self.min_border_pixels = pixels;
        self
    }

    pub fn with_merge_threshold(mut self, threshold: f32) -> Self {
        self.merge_threshold = threshold;
        self
    }

    pub fn with_max_fragment_size(mut self, pixels: usize) -> Self {
        self.max_fragment_size = pixels;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.top_quantile) {
            return Err(CellTrackError::InvalidParameter(format!(
                "top_quantile must lie in [0, 1], got {}",
                self.top_quantile
            )));
        }
        Ok(())
    }
}

/// Merges over-split watershed regions and folds tiny fragments into their
/// neighbours.
///
/// The result is densely labelled `1..=K` and covers exactly the foreground
/// pixels of `labels`.
///
/// # Errors
/// Returns [`CellTrackError::ShapeMismatch`] if the two arrays differ in shape.
pub fn merge_oversegmentation(
    labels: ArrayView2<u32>,
    probability: ArrayView2<f32>,
    config: &MergeConfig,
) -> Result<LabelMask> {
    let merged = merge_regions(labels, probability, config)?;
    let cleaned = correct_artefacts(merged.view(), config.max_fragment_size);
    Ok(relabel_sequential(&cleaned.view()))
}

/// Region merge without the fragment cleanup pass.
pub fn merge_regions(
    labels: ArrayView2<u32>,
    probability: ArrayView2<f32>,
    config: &MergeConfig,
) -> Result<LabelMask> {
    ensure_same_shape(&labels, &probability)?;
    config.validate()?;

    let shape = labels.dim();
    let mut regions: Vec<CandidateRegion> = label_pixels(&labels)
        .into_iter()
        .map(|(label, pixels)| CandidateRegion::new(label, pixels, shape))
        .collect();

    let mut out = LabelMask::zeros(shape);
    let mut next_label = 0u32;

    for i in 0..regions.len() {
        if regions[i].is_consumed() {
            continue;
        }

        let mut last_absorbed = None;
        for j in (i + 1)..regions.len() {
            let (head, tail) = regions.split_at_mut(j);
            let (current, candidate) = (&mut head[i], &mut tail[0]);
            if candidate.is_consumed() {
                continue;
            }
            let (Some(a), Some(b)) = (current.bbox, candidate.bbox) else {
                continue;
            };
            if !a.overlaps(&b, config.box_margin) {
                continue;
            }

            let border = current.border_with(candidate);
            if border.len() < config.min_border_pixels {
                continue;
            }
            let Some(score) = top_quantile_mean(&border, &probability, config.top_quantile)
            else {
                continue;
            };
            if score > f64::from(config.merge_threshold) {
                debug!(
                    "merging region {} into {} (border {} px, score {:.4})",
                    candidate.label,
                    current.label,
                    border.len(),
                    score
                );
                current.absorb(candidate);
                last_absorbed = Some(j);
            }
        }

        // The grown region continues at the slot of its last partner so later
        // regions are tested against the merged shape.
        if let Some(j) = last_absorbed {
            let (head, tail) = regions.split_at_mut(j);
            head[i].transfer_to(&mut tail[0]);
            continue;
        }

        next_label += 1;
        for &px in &regions[i].pixels {
            out[px] = next_label;
        }
    }

    Ok(relabel_sequential(&out.view()))
}

/// Mean of the border probabilities at or above the given quantile.
///
/// `None` when the border is empty.
fn top_quantile_mean(
    border: &[(usize, usize)],
    probability: &ArrayView2<f32>,
    quantile: f64,
) -> Option<f64> {
    let mut values: Vec<f64> = border
        .iter()
        .map(|&px| f64::from(probability[px]))
        .collect();
    values.sort_by(f64::total_cmp);

    let cutoff = quantile_sorted(&values, quantile)?;
    let (sum, count) = values
        .iter()
        .filter(|&&v| v >= cutoff)
        .fold((0.0, 0usize), |(s, n), &v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Linearly interpolated quantile of an ascending slice.
fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let h = last as f64 * q;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(last);
    let t = h - lo as f64;
    let (a, b) = (sorted[lo], sorted[hi]);
    if t >= 0.5 {
        Some(b - (b - a) * (1.0 - t))
    } else {
        Some(a + (b - a) * t)
    }
}
