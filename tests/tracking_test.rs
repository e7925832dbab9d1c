use std::collections::HashMap;

use celltrack_rs::tracker::{CorrespondenceConfig, CostFunction, match_labels};
use celltrack_rs::{CellTrackError, LabelMask, correspond};
use ndarray::s;

fn square(
    mask: &mut LabelMask,
    rows: std::ops::Range<usize>,
    cols: std::ops::Range<usize>,
    label: u32,
) {
    mask.slice_mut(s![rows, cols]).fill(label);
}

/// Every next-mask label maps to exactly one output label.
fn label_mapping(next: &LabelMask, out: &LabelMask) -> HashMap<u32, u32> {
    let mut mapping = HashMap::new();
    for (&n, &o) in next.iter().zip(out.iter()) {
        if n == 0 {
            assert_eq!(o, 0);
            continue;
        }
        let previous = mapping.insert(n, o);
        assert!(previous.is_none() || previous == Some(o));
    }
    mapping
}

#[test]
fn test_unmoved_single_cell_keeps_identity() {
    let mut prev = LabelMask::zeros((20, 20));
    square(&mut prev, 0..10, 0..10, 5);
    let mut next = LabelMask::zeros((20, 20));
    square(&mut next, 0..10, 0..10, 1);

    let out = correspond(prev.view(), next.view()).unwrap();
    assert_eq!(out, prev);
}

#[test]
fn test_new_cell_gets_next_free_label() {
    let mut prev = LabelMask::zeros((30, 30));
    square(&mut prev, 0..8, 0..8, 1);
    square(&mut prev, 0..8, 15..23, 2);

    let mut next = LabelMask::zeros((30, 30));
    square(&mut next, 1..9, 1..9, 3);
    square(&mut next, 1..9, 16..24, 1);
    square(&mut next, 20..28, 20..28, 2);

    let out = correspond(prev.view(), next.view()).unwrap();
    assert_eq!(out[[4, 4]], 1);
    assert_eq!(out[[4, 20]], 2);
    assert_eq!(out[[24, 24]], 3);

    let mapping = label_mapping(&next, &out);
    assert_eq!(mapping.len(), 3);
}

#[test]
fn test_disjoint_cell_is_novel() {
    let mut prev = LabelMask::zeros((20, 20));
    square(&mut prev, 0..5, 0..5, 3);
    square(&mut prev, 0..5, 10..15, 8);
    let mut next = LabelMask::zeros((20, 20));
    square(&mut next, 0..5, 0..5, 1);
    square(&mut next, 12..18, 12..18, 2);

    let out = correspond(prev.view(), next.view()).unwrap();
    assert_eq!(out[[2, 2]], 3);
    assert!(out[[15, 15]] > 8);
}

#[test]
fn test_vanished_cells_are_reported() {
    let mut prev = LabelMask::zeros((20, 20));
    square(&mut prev, 0..5, 0..5, 1);
    square(&mut prev, 0..5, 10..15, 2);
    square(&mut prev, 10..15, 0..5, 3);
    let mut next = LabelMask::zeros((20, 20));
    square(&mut next, 0..5, 0..5, 4);
    square(&mut next, 10..15, 0..5, 9);

    let table = match_labels(prev.view(), next.view(), &CorrespondenceConfig::default()).unwrap();
    assert_eq!(table.vanished, vec![2]);
    assert!(table.minted.is_empty());

    let out = table.apply(next.view());
    assert_eq!(out[[1, 1]], 1);
    assert_eq!(out[[12, 1]], 3);
}

#[test]
fn test_ambiguous_claim_goes_to_larger_overlap() {
    // Both next cells touch previous cell 1, but only one of them can keep it.
    let mut prev = LabelMask::zeros((20, 30));
    square(&mut prev, 0..10, 0..10, 1);
    square(&mut prev, 0..10, 20..30, 2);
    let mut next = LabelMask::zeros((20, 30));
    square(&mut next, 0..10, 0..8, 1);
    square(&mut next, 0..10, 8..12, 2);
    square(&mut next, 0..10, 20..30, 3);

    let out = correspond(prev.view(), next.view()).unwrap();
    assert_eq!(out[[5, 2]], 1);
    assert_eq!(out[[5, 25]], 2);
    assert_eq!(out[[5, 10]], 3);
}

#[test]
fn test_cost_functions_agree_on_clear_motion() {
    let mut prev = LabelMask::zeros((30, 30));
    square(&mut prev, 2..10, 2..10, 1);
    square(&mut prev, 15..25, 15..25, 2);
    let mut next = LabelMask::zeros((30, 30));
    square(&mut next, 16..26, 16..26, 1);
    square(&mut next, 3..11, 3..11, 2);

    for cost in [CostFunction::Overlap, CostFunction::Iou, CostFunction::CentroidDistance] {
        let config = CorrespondenceConfig::default().with_cost(cost);
        let table = match_labels(prev.view(), next.view(), &config).unwrap();
        assert_eq!(table.output_label(1), Some(2), "{cost:?}");
        assert_eq!(table.output_label(2), Some(1), "{cost:?}");
    }
}

#[test]
fn test_outputs_are_inherited_or_fresh() {
    let mut prev = LabelMask::zeros((40, 40));
    square(&mut prev, 0..10, 0..10, 4);
    square(&mut prev, 0..10, 20..30, 11);
    square(&mut prev, 25..35, 5..15, 6);
    let mut next = LabelMask::zeros((40, 40));
    square(&mut next, 2..12, 2..12, 1);
    square(&mut next, 2..12, 22..32, 2);
    square(&mut next, 20..30, 30..40, 3);
    square(&mut next, 30..40, 0..10, 4);

    let out = correspond(prev.view(), next.view()).unwrap();
    let prev_labels = [4, 6, 11];
    for (_, o) in label_mapping(&next, &out) {
        assert!(prev_labels.contains(&o) || o > 11);
    }
}

#[test]
fn test_shape_mismatch_is_fatal() {
    let prev = LabelMask::zeros((10, 10));
    let next = LabelMask::zeros((10, 12));
    assert!(matches!(
        correspond(prev.view(), next.view()),
        Err(CellTrackError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_empty_next_mask() {
    let mut prev = LabelMask::zeros((10, 10));
    square(&mut prev, 0..5, 0..5, 1);
    let next = LabelMask::zeros((10, 10));
    let out = correspond(prev.view(), next.view()).unwrap();
    assert!(out.iter().all(|&v| v == 0));
}

#[test]
fn test_no_previous_frame_relabels_densely() {
    let prev = LabelMask::zeros((10, 10));
    let mut next = LabelMask::zeros((10, 10));
    square(&mut next, 0..3, 0..3, 40);
    square(&mut next, 5..8, 5..8, 17);

    let out = correspond(prev.view(), next.view()).unwrap();
    assert_eq!(out[[1, 1]], 2);
    assert_eq!(out[[6, 6]], 1);
}
