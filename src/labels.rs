//! Label mask primitives shared by the merge postprocessor and the tracker.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use ndarray::{Array2, ArrayView2};

use crate::error::{CellTrackError, Result};

/// Integer-labelled mask. `0` is background, every positive value is one cell.
pub type LabelMask = Array2<u32>;

/// Per-pixel cell probability produced by the network.
pub type ProbabilityMap = Array2<f32>;

/// Pixel neighbourhood used for flood fills and dilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    /// Edge neighbours only.
    Four,
    /// Edge and corner neighbours.
    #[default]
    Eight,
}

impl Connectivity {
    fn offsets(self) -> &'static [(isize, isize)] {
        const FOUR: [(isize, isize); 4] = [(-1, 0), (0, -1), (0, 1), (1, 0)];
        const EIGHT: [(isize, isize); 8] = [
            (-1, -1),
            (-1, 0),
            (-1, 1),
            (0, -1),
            (0, 1),
            (1, -1),
            (1, 0),
            (1, 1),
        ];
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }

    /// In-bounds neighbours of `(row, col)` in a frame of `shape`.
    pub fn neighbours(
        self,
        (row, col): (usize, usize),
        (height, width): (usize, usize),
    ) -> impl Iterator<Item = (usize, usize)> {
        self.offsets().iter().filter_map(move |&(dr, dc)| {
            let r = row.checked_add_signed(dr)?;
            let c = col.checked_add_signed(dc)?;
            (r < height && c < width).then_some((r, c))
        })
    }
}

/// Fails with [`CellTrackError::ShapeMismatch`] unless both arrays share a shape.
pub fn ensure_same_shape<A, B>(expected: &ArrayView2<A>, got: &ArrayView2<B>) -> Result<()> {
    if expected.dim() != got.dim() {
        return Err(CellTrackError::ShapeMismatch {
            expected: expected.dim(),
            got: got.dim(),
        });
    }
    Ok(())
}

/// Sorted foreground labels present in the mask.
pub fn unique_labels(mask: &ArrayView2<u32>) -> Vec<u32> {
    mask.iter()
        .copied()
        .filter(|&v| v > 0)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Pixel count per foreground label.
pub fn label_areas(mask: &ArrayView2<u32>) -> BTreeMap<u32, usize> {
    let mut areas = BTreeMap::new();
    for &v in mask.iter().filter(|&&v| v > 0) {
        *areas.entry(v).or_insert(0) += 1;
    }
    areas
}

/// Pixel coordinates grouped by foreground label.
pub fn label_pixels(mask: &ArrayView2<u32>) -> BTreeMap<u32, Vec<(usize, usize)>> {
    let mut pixels: BTreeMap<u32, Vec<(usize, usize)>> = BTreeMap::new();
    for (idx, &v) in mask.indexed_iter() {
        if v > 0 {
            pixels.entry(v).or_default().push(idx);
        }
    }
    pixels
}

/// Largest label value, `0` for an all-background mask.
pub fn max_label(mask: &ArrayView2<u32>) -> u32 {
    mask.iter().copied().max().unwrap_or(0)
}

/// Maps the foreground labels onto `1..=K`, preserving their relative order.
pub fn relabel_sequential(mask: &ArrayView2<u32>) -> LabelMask {
    let lookup: BTreeMap<u32, u32> = unique_labels(mask)
        .into_iter()
        .zip(1..)
        .collect();
    mask.mapv(|v| if v == 0 { 0 } else { lookup[&v] })
}

/// Labels the connected components of a binary mask in raster order.
///
/// Returns the label mask together with the number of components.
pub fn connected_components(
    binary: &ArrayView2<bool>,
    connectivity: Connectivity,
) -> (LabelMask, u32) {
    let shape = binary.dim();
    let mut labels = LabelMask::zeros(shape);
    let mut count = 0;
    let mut queue = VecDeque::new();

    for (start, &fg) in binary.indexed_iter() {
        if !fg || labels[start] != 0 {
            continue;
        }
        count += 1;
        labels[start] = count;
        queue.push_back(start);
        while let Some(px) = queue.pop_front() {
            for n in connectivity.neighbours(px, shape) {
                if binary[n] && labels[n] == 0 {
                    labels[n] = count;
                    queue.push_back(n);
                }
            }
        }
    }

    (labels, count)
}
