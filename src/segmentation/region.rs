use std::collections::HashSet;

use crate::labels::Connectivity;

/// Axis-aligned bounding box of a pixel set, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_row: usize,
    pub max_row: usize,
    pub min_col: usize,
    pub max_col: usize,
}

impl BoundingBox {
    /// Box of a single pixel.
    #[inline]
    pub fn point(row: usize, col: usize) -> Self {
        Self {
            min_row: row,
            max_row: row,
            min_col: col,
            max_col: col,
        }
    }

    /// Box enclosing every pixel, `None` for an empty set.
    pub fn from_pixels<'a, I>(pixels: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a (usize, usize)>,
    {
        pixels
            .into_iter()
            .map(|&(r, c)| Self::point(r, c))
            .reduce(|a, b| a.union(&b))
    }

    /// Smallest box containing both boxes.
    #[inline]
    pub fn union(&self, other: &BoundingBox) -> Self {
        Self {
            min_row: self.min_row.min(other.min_row),
            max_row: self.max_row.max(other.max_row),
            min_col: self.min_col.min(other.min_col),
            max_col: self.max_col.max(other.max_col),
        }
    }

    /// Whether the boxes overlap on both axes once widened by `margin`.
    pub fn overlaps(&self, other: &BoundingBox, margin: usize) -> bool {
        intervals_overlap(
            (self.min_row, self.max_row),
            (other.min_row, other.max_row),
            margin,
        ) && intervals_overlap(
            (self.min_col, self.max_col),
            (other.min_col, other.max_col),
            margin,
        )
    }
}

/// `[a0, a1]` and `[b0, b1]` overlap with margin `m` iff
/// `(a0 - m < b0 && a1 + m > b0) || (b0 - m < a0 && b1 + m > a0)`.
fn intervals_overlap((a0, a1): (usize, usize), (b0, b1): (usize, usize), margin: usize) -> bool {
    let (a0, a1, b0, b1, m) = (
        a0 as isize,
        a1 as isize,
        b0 as isize,
        b1 as isize,
        margin as isize,
    );
    (a0 - m < b0 && a1 + m > b0) || (b0 - m < a0 && b1 + m > a0)
}

/// 3x3 dilation of a pixel set, clipped to the frame.
pub fn dilate(pixels: &[(usize, usize)], shape: (usize, usize)) -> HashSet<(usize, usize)> {
    let mut out: HashSet<(usize, usize)> = pixels.iter().copied().collect();
    for &px in pixels {
        out.extend(Connectivity::Eight.neighbours(px, shape));
    }
    out
}

/// One watershed region considered for merging.
#[derive(Debug, Clone)]
pub struct CandidateRegion {
    /// Label in the watershed input.
    pub label: u32,
    /// Pixels owned by the region.
    pub pixels: Vec<(usize, usize)>,
    /// 3x3-dilated pixels, only used to find shared borders.
    pub dilated: HashSet<(usize, usize)>,
    /// Bounding box of `dilated`.
    pub bbox: Option<BoundingBox>,
}

impl CandidateRegion {
    pub fn new(label: u32, pixels: Vec<(usize, usize)>, shape: (usize, usize)) -> Self {
        let dilated = dilate(&pixels, shape);
        let bbox = BoundingBox::from_pixels(&dilated);
        Self {
            label,
            pixels,
            dilated,
            bbox,
        }
    }

    /// A region is consumed once another region has absorbed it.
    #[inline]
    pub fn is_consumed(&self) -> bool {
        self.dilated.is_empty()
    }

    /// Pixels present in both dilated masks.
    pub fn border_with(&self, other: &CandidateRegion) -> Vec<(usize, usize)> {
        let (small, large) = if self.dilated.len() <= other.dilated.len() {
            (&self.dilated, &other.dilated)
        } else {
            (&other.dilated, &self.dilated)
        };
        small.iter().filter(|px| large.contains(px)).copied().collect()
    }

    /// Moves `other`'s pixels into `self` and leaves `other` consumed.
    pub fn absorb(&mut self, other: &mut CandidateRegion) {
        self.pixels.append(&mut other.pixels);
        self.dilated.extend(other.dilated.drain());
        self.bbox = match (self.bbox, other.bbox.take()) {
            (Some(a), Some(b)) => Some(a.union(&b)),
            (a, b) => a.or(b),
        };
    }

    /// Hands the region's content over to `target`, leaving `self` consumed.
    pub fn transfer_to(&mut self, target: &mut CandidateRegion) {
        target.pixels = std::mem::take(&mut self.pixels);
        target.dilated = std::mem::take(&mut self.dilated);
        target.bbox = self.bbox.take();
    }
}
