//! Cleanup of tiny watershed fragments.

use std::collections::BTreeMap;

use log::debug;
use ndarray::ArrayView2;

use crate::labels::{LabelMask, label_pixels};
use crate::segmentation::region::dilate;

/// Folds every region of at most `max_fragment_size` pixels into the
/// neighbouring cell it shares the most ring pixels with.
///
/// Fragments that only touch background are left as they are, so foreground
/// coverage never changes.
pub fn correct_artefacts(labels: ArrayView2<u32>, max_fragment_size: usize) -> LabelMask {
    let shape = labels.dim();
    let mut out = labels.to_owned();

    // Pixels currently carrying each fragment label. A fragment folded into
    // another one travels with it when that one is folded in turn.
    let mut fragments: BTreeMap<u32, Vec<(usize, usize)>> = label_pixels(&labels)
        .into_iter()
        .filter(|(_, pixels)| pixels.len() <= max_fragment_size)
        .collect();
    let order: Vec<u32> = fragments.keys().copied().collect();

    for label in order {
        let Some(pixels) = fragments.remove(&label) else {
            continue;
        };
        let mut ring_counts: BTreeMap<u32, usize> = BTreeMap::new();
        for px in dilate(&pixels, shape) {
            let v = out[px];
            if v != 0 && v != label {
                *ring_counts.entry(v).or_insert(0) += 1;
            }
        }

        // Ties go to the smallest label.
        let Some((replacement, _)) = ring_counts
            .into_iter()
            .fold(None, |best: Option<(u32, usize)>, (v, n)| match best {
                Some((_, m)) if m >= n => best,
                _ => Some((v, n)),
            })
        else {
            continue;
        };

        debug!(
            "folding {} px fragment {} into {}",
            pixels.len(),
            label,
            replacement
        );
        for &px in &pixels {
            out[px] = replacement;
        }
        if let Some(target) = fragments.get_mut(&replacement) {
            target.extend(pixels);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, s};

    #[test]
    fn test_fragment_joins_surrounding_cell() {
        let mut labels = LabelMask::zeros((7, 7));
        labels.slice_mut(s![1..6, 1..6]).fill(1);
        labels[[3, 3]] = 2;
        let out = correct_artefacts(labels.view(), 3);
        assert_eq!(out.iter().filter(|&&v| v == 1).count(), 25);
        assert!(!out.iter().any(|&v| v == 2));
    }

    #[test]
    fn test_isolated_fragment_survives() {
        let labels = array![[0, 0, 0, 0], [0, 4, 0, 0], [0, 0, 0, 0]];
        let out = correct_artefacts(labels.view(), 3);
        assert_eq!(out, labels);
    }

    #[test]
    fn test_chained_fragments_follow_each_other() {
        // 2 only touches 3, and 3 touches the cell 5.
        let mut labels = LabelMask::zeros((5, 7));
        labels[[1, 1]] = 2;
        labels[[1, 2]] = 3;
        labels.slice_mut(s![0..3, 3..6]).fill(5);
        let out = correct_artefacts(labels.view(), 3);
        assert_eq!(out[[1, 1]], 5);
        assert_eq!(out[[1, 2]], 5);
        assert_eq!(out.iter().filter(|&&v| v == 5).count(), 11);
    }

    #[test]
    fn test_fragment_prefers_largest_contact() {
        let labels = array![
            [1, 1, 1, 2],
            [1, 9, 2, 2],
            [1, 1, 2, 2],
        ];
        let out = correct_artefacts(labels.view(), 3);
        assert_eq!(out[[1, 1]], 1);
    }
}
