//! Integration of the segmentation and tracking cores with frame sources,
//! predictors and mask storage.
//!
//! This module provides the collaborator traits and a batch pipeline that
//! drives prediction, segmentation and tracking over time ranges.

mod memory;
mod pipeline;
mod source;

pub use memory::InMemoryStore;
pub use pipeline::{PipelineConfig, SegmentationPipeline};
pub use source::{FrameSource, MaskStore, Predictor};

#[cfg(feature = "burn-backend")]
mod burn_backend;

#[cfg(feature = "burn-backend")]
pub use burn_backend::{BurnModel, BurnPredictor, BurnPredictorError};
