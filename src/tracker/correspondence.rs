//! Propagation of cell identities from one frame to the next.

use std::collections::BTreeMap;

use log::{debug, warn};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::error::{CellTrackError, Result};
use crate::labels::{LabelMask, ensure_same_shape, max_label};
use crate::tracker::cost::{CostFunction, MAX_MATCH_COST, OverlapTable};
use crate::tracker::matching::{self, AssignmentResult};

/// What to do when either frame holds at most one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SingleCellPolicy {
    /// Skip the solver and match the single cell to its largest overlap.
    #[default]
    Resolve,
    /// Return the next mask unchanged.
    Unchanged,
}

/// Configuration of the identity correspondence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrespondenceConfig {
    pub cost: CostFunction,
    /// Minimum number of shared pixels for a pair to keep its identity.
    pub min_overlap: usize,
    pub single_cell: SingleCellPolicy,
}

impl Default for CorrespondenceConfig {
    fn default() -> Self {
        Self {
            cost: CostFunction::Overlap,
            min_overlap: 1,
            single_cell: SingleCellPolicy::Resolve,
        }
    }
}

impl CorrespondenceConfig {
    pub fn with_cost(mut self, cost: CostFunction) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_min_overlap(mut self, pixels: usize) -> Self {
        self.min_overlap = pixels;
        self
    }

    pub fn with_single_cell(mut self, policy: SingleCellPolicy) -> Self {
        self.single_cell = policy;
        self
    }

    fn overlap_floor(&self) -> usize {
        self.min_overlap.max(1)
    }
}

/// Outcome of matching the cells of two consecutive frames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrespondenceTable {
    /// Previous label -> next label it continues as.
    pub matches: BTreeMap<u32, u32>,
    /// Next label -> label written to the output.
    pub resolved: BTreeMap<u32, u32>,
    /// Output labels given to cells without a predecessor, ascending.
    pub minted: Vec<u32>,
    /// Previous labels without a successor.
    pub vanished: Vec<u32>,
}

impl CorrespondenceTable {
    /// Identity table: every next label keeps its value.
    fn unchanged(next_labels: &[u32]) -> Self {
        Self {
            resolved: next_labels.iter().map(|&n| (n, n)).collect(),
            ..Self::default()
        }
    }

    /// Output label for a next-mask label.
    pub fn output_label(&self, next: u32) -> Option<u32> {
        self.resolved.get(&next).copied()
    }

    /// Previous label a next-mask label was matched to, if any.
    pub fn previous_of(&self, next: u32) -> Option<u32> {
        self.matches
            .iter()
            .find_map(|(&p, &n)| (n == next).then_some(p))
    }

    /// Writes the resolved labels into a copy of `next`.
    pub fn apply(&self, next: ArrayView2<u32>) -> LabelMask {
        next.mapv(|v| self.resolved.get(&v).copied().unwrap_or(0))
    }
}

/// Relabels `next` so that cells continuing from `prev` keep their identity,
/// with the default configuration.
///
/// # Errors
/// Returns [`crate::CellTrackError::ShapeMismatch`] if the masks differ in shape.
pub fn correspond(prev: ArrayView2<u32>, next: ArrayView2<u32>) -> Result<LabelMask> {
    correspond_with(prev, next, &CorrespondenceConfig::default())
}

/// [`correspond`] with an explicit configuration.
pub fn correspond_with(
    prev: ArrayView2<u32>,
    next: ArrayView2<u32>,
    config: &CorrespondenceConfig,
) -> Result<LabelMask> {
    let table = match_labels(prev, next, config)?;
    Ok(table.apply(next))
}

/// Matches the cells of `next` to those of `prev`.
///
/// Matched cells inherit the previous label, all others receive fresh labels
/// above `max(prev)` in ascending order of their next-mask label.
pub fn match_labels(
    prev: ArrayView2<u32>,
    next: ArrayView2<u32>,
    config: &CorrespondenceConfig,
) -> Result<CorrespondenceTable> {
    ensure_same_shape(&prev, &next)?;

    let table = OverlapTable::new(&prev, &next);
    let prev_labels: Vec<u32> = table.prev.iter().map(|s| s.label).collect();
    let next_labels: Vec<u32> = table.next.iter().map(|s| s.label).collect();
    let max_prev = max_label(&prev);

    if next_labels.is_empty() {
        return Ok(CorrespondenceTable {
            vanished: prev_labels,
            ..CorrespondenceTable::default()
        });
    }

    let AssignmentResult {
        matches,
        unmatched_prev,
        unmatched_next,
    } = if prev_labels.is_empty() {
        AssignmentResult {
            matches: vec![],
            unmatched_prev: vec![],
            unmatched_next: (0..next_labels.len()).collect(),
        }
    } else if prev_labels.len() == 1 || next_labels.len() == 1 {
        if config.single_cell == SingleCellPolicy::Unchanged {
            warn!("single cell in one frame, leaving labels unchanged");
            return Ok(CorrespondenceTable::unchanged(&next_labels));
        }
        resolve_single(&table, config.overlap_floor())
    } else {
        let cost = table.cost_matrix(config.cost, config.overlap_floor(), prev.dim());
        matching::linear_assignment(&cost, MAX_MATCH_COST)?
    };

    let mut out = CorrespondenceTable::default();
    for (i, j) in matches {
        out.matches.insert(prev_labels[i], next_labels[j]);
        out.resolved.insert(next_labels[j], prev_labels[i]);
    }
    for (k, j) in unmatched_next.into_iter().enumerate() {
        let label = mint_label(max_prev, k)?;
        debug!("cell {} is new, labelled {}", next_labels[j], label);
        out.resolved.insert(next_labels[j], label);
        out.minted.push(label);
    }
    out.vanished = unmatched_prev.into_iter().map(|i| prev_labels[i]).collect();
    out.vanished.sort_unstable();

    Ok(out)
}

/// The `offset`-th fresh label above `max_prev`.
fn mint_label(max_prev: u32, offset: usize) -> Result<u32> {
    u32::try_from(offset)
        .ok()
        .and_then(|k| max_prev.checked_add(1)?.checked_add(k))
        .ok_or_else(|| {
            CellTrackError::InvalidParameter(format!(
                "no free label above {max_prev} for new cell #{offset}"
            ))
        })
}

/// Assignment when one side has a single cell: the pair with the largest
/// overlap wins, ties going to the smaller label.
fn resolve_single(table: &OverlapTable, floor: usize) -> AssignmentResult {
    let (rows, cols) = table.overlap.dim();
    let best = table
        .overlap
        .indexed_iter()
        .filter(|&(_, &o)| o >= floor)
        .fold(None, |best: Option<((usize, usize), usize)>, (idx, &o)| {
            match best {
                Some((_, b)) if b >= o => best,
                _ => Some((idx, o)),
            }
        });

    match best {
        Some(((i, j), _)) => AssignmentResult {
            matches: vec![(i, j)],
            unmatched_prev: (0..rows).filter(|&r| r != i).collect(),
            unmatched_next: (0..cols).filter(|&c| c != j).collect(),
        },
        None => AssignmentResult {
            matches: vec![],
            unmatched_prev: (0..rows).collect(),
            unmatched_next: (0..cols).collect(),
        },
    }
}
