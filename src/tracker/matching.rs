//! Linear assignment between previous-frame and next-frame cells.

use ndarray::Array2;

use crate::error::{CellTrackError, Result};

/// Cost given to padding rows/columns of the square solver matrix.
const PADDING_COST: f64 = 1e6;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentResult {
    /// `(previous index, next index)` pairs whose cost passed the threshold.
    pub matches: Vec<(usize, usize)>,
    pub unmatched_prev: Vec<usize>,
    pub unmatched_next: Vec<usize>,
}

/// Minimum-cost one-to-one assignment of rows (previous cells) to columns
/// (next cells).
///
/// The matrix is padded to a square and solved with Jonker-Volgenant. An
/// assigned pair only counts as a match when its cost is `<= thresh`.
pub fn linear_assignment(cost_matrix: &Array2<f64>, thresh: f64) -> Result<AssignmentResult> {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 {
        return Ok(AssignmentResult {
            matches: vec![],
            unmatched_prev: vec![],
            unmatched_next: (0..num_cols).collect(),
        });
    }

    if num_cols == 0 {
        return Ok(AssignmentResult {
            matches: vec![],
            unmatched_prev: (0..num_rows).collect(),
            unmatched_next: vec![],
        });
    }

    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), PADDING_COST);
    padded
        .slice_mut(ndarray::s![..num_rows, ..num_cols])
        .assign(cost_matrix);

    let (row_to_col, _) = lapjv::lapjv(&padded)
        .map_err(|e| CellTrackError::Assignment(format!("{e:?}")))?;

    let mut matches = vec![];
    let mut unmatched_prev = vec![];
    let mut unmatched_next_mask = vec![true; num_cols];

    for (row_idx, &col_idx) in row_to_col.iter().enumerate().take(num_rows) {
        if col_idx < num_cols && cost_matrix[[row_idx, col_idx]] <= thresh {
            matches.push((row_idx, col_idx));
            unmatched_next_mask[col_idx] = false;
        } else {
            unmatched_prev.push(row_idx);
        }
    }

    let unmatched_next = unmatched_next_mask
        .iter()
        .enumerate()
        .filter_map(|(i, &u)| u.then_some(i))
        .collect();

    Ok(AssignmentResult {
        matches,
        unmatched_prev,
        unmatched_next,
    })
}
