//! Segmentation cleanup and identity tracking for time-lapse cell masks.
//!
//! The crate has two algorithmic cores that operate on integer label masks:
//!
//! - [`merge_oversegmentation`] repairs watershed output by merging regions
//!   whose shared border is strongly predicted to be cell.
//! - [`correspond`] propagates cell identities from the previous frame's mask
//!   to a freshly segmented mask through a minimum-cost assignment.
//!
//! The [`integration`] module wires both into a batch pipeline over
//! user-supplied frame sources, predictors and mask stores.

pub mod error;
pub mod integration;
pub mod labels;
pub mod segmentation;
pub mod tracker;

pub use error::{CellTrackError, Result};
pub use labels::{LabelMask, ProbabilityMap};
pub use segmentation::{MergeConfig, SegmentConfig, merge_oversegmentation, segment, threshold};
pub use tracker::{CorrespondenceConfig, CorrespondenceTable, CostFunction, correspond};
