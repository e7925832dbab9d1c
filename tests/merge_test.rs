use celltrack_rs::segmentation::{MergeConfig, merge_oversegmentation};
use celltrack_rs::{CellTrackError, LabelMask, ProbabilityMap};
use ndarray::s;
use std::collections::HashMap;

fn foreground(mask: &LabelMask) -> usize {
    mask.iter().filter(|&&v| v > 0).count()
}

fn merge_default(labels: &LabelMask, probability: &ProbabilityMap) -> LabelMask {
    merge_oversegmentation(labels.view(), probability.view(), &MergeConfig::default()).unwrap()
}

/// Two one-pixel-wide columns with a one-pixel gap; their dilations share
/// `len + 2` pixels in the gap column.
fn columns_with_border(len: usize) -> LabelMask {
    let mut labels = LabelMask::zeros((len + 6, 9));
    labels.slice_mut(s![2..2 + len, 3]).fill(1);
    labels.slice_mut(s![2..2 + len, 5]).fill(2);
    labels
}

#[test]
fn test_adjacent_squares_merge() {
    let mut labels = LabelMask::zeros((12, 22));
    labels.slice_mut(s![1..11, 1..11]).fill(1);
    labels.slice_mut(s![1..11, 11..21]).fill(2);
    let mut probability = ProbabilityMap::zeros(labels.dim());
    probability.slice_mut(s![.., 10..12]).fill(1.0);

    let out = merge_default(&labels, &probability);
    assert_eq!(out.iter().filter(|&&v| v == 1).count(), 200);
    assert_eq!(out.iter().copied().max(), Some(1));
}

#[test]
fn test_border_below_floor_does_not_merge() {
    let labels = columns_with_border(13);
    let probability = ProbabilityMap::ones(labels.dim());
    let out = merge_default(&labels, &probability);
    assert_eq!(out.iter().copied().max(), Some(2));
}

#[test]
fn test_border_at_floor_merges() {
    let labels = columns_with_border(14);
    let probability = ProbabilityMap::ones(labels.dim());
    let out = merge_default(&labels, &probability);
    assert_eq!(out.iter().copied().max(), Some(1));
    assert_eq!(foreground(&out), 28);
}

#[test]
fn test_threshold_is_strict() {
    let labels = columns_with_border(14);
    let probability = ProbabilityMap::from_elem(labels.dim(), 0.99);
    let out = merge_default(&labels, &probability);
    assert_eq!(out.iter().copied().max(), Some(2));

    let config = MergeConfig::default().with_merge_threshold(0.98);
    let out = merge_oversegmentation(labels.view(), probability.view(), &config).unwrap();
    assert_eq!(out.iter().copied().max(), Some(1));
}

#[test]
fn test_border_floor_is_configurable() {
    let labels = columns_with_border(13);
    let probability = ProbabilityMap::ones(labels.dim());
    let config = MergeConfig::default().with_min_border_pixels(15);
    let out = merge_oversegmentation(labels.view(), probability.view(), &config).unwrap();
    assert_eq!(out.iter().copied().max(), Some(1));
}

#[test]
fn test_clean_input_is_only_relabelled() {
    let mut labels = LabelMask::zeros((30, 30));
    labels.slice_mut(s![0..8, 0..8]).fill(3);
    labels.slice_mut(s![0..8, 8..16]).fill(9);
    labels.slice_mut(s![15..25, 2..12]).fill(20);
    labels.slice_mut(s![15..25, 12..20]).fill(21);
    let probability = ProbabilityMap::from_elem(labels.dim(), 0.5);

    let out = merge_default(&labels, &probability);

    let mut mapping = HashMap::new();
    for (&a, &b) in labels.iter().zip(out.iter()) {
        assert_eq!(a == 0, b == 0);
        if a > 0 {
            assert_eq!(*mapping.entry(a).or_insert(b), b);
        }
    }
    let mut outputs: Vec<u32> = mapping.values().copied().collect();
    outputs.sort_unstable();
    assert_eq!(outputs, vec![1, 2, 3, 4]);
}

#[test]
fn test_pixels_are_conserved() {
    // Stripes of alternating labels with a few isolated and embedded
    // fragments.
    let mut labels = LabelMask::zeros((40, 40));
    for r in 0..40 {
        for c in 0..40 {
            if (r / 6 + c / 7) % 3 != 0 {
                labels[[r, c]] = (r / 6 * 6 + c / 7) as u32 + 1;
            }
        }
    }
    labels[[20, 20]] = 99;
    labels[[0, 39]] = 98;
    let mut probability = ProbabilityMap::zeros(labels.dim());
    for ((r, c), p) in probability.indexed_iter_mut() {
        *p = if (r + c) % 5 == 0 { 1.0 } else { 0.995 };
    }

    let out = merge_default(&labels, &probability);
    assert_eq!(foreground(&out), foreground(&labels));

    let max = out.iter().copied().max().unwrap_or(0);
    for label in 1..=max {
        assert!(out.iter().any(|&v| v == label), "label {label} missing");
    }
}

#[test]
fn test_label_split_into_two_components() {
    // Label 1 covers two separate blocks, label 2 sits against one of them.
    let mut labels = LabelMask::zeros((30, 30));
    labels.slice_mut(s![2..10, 2..10]).fill(1);
    labels.slice_mut(s![20..28, 20..28]).fill(1);
    labels.slice_mut(s![2..10, 10..18]).fill(2);
    let probability = ProbabilityMap::ones(labels.dim());

    let out = merge_default(&labels, &probability);
    assert_eq!(foreground(&out), 192);
    assert_eq!(foreground(&out), foreground(&labels));
    assert!(out.iter().all(|&v| v <= 2));
}

#[test]
fn test_empty_input() {
    let labels = LabelMask::zeros((16, 16));
    let probability = ProbabilityMap::ones((16, 16));
    let out = merge_default(&labels, &probability);
    assert_eq!(out, labels);
}

#[test]
fn test_shape_mismatch() {
    let labels = LabelMask::zeros((16, 16));
    let probability = ProbabilityMap::ones((16, 17));
    assert!(matches!(
        merge_oversegmentation(labels.view(), probability.view(), &MergeConfig::default()),
        Err(CellTrackError::ShapeMismatch { .. })
    ));
}
