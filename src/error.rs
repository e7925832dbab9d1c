//! Error type shared by the segmentation, tracking and pipeline layers.

use thiserror::Error;

/// Errors raised for contract violations and collaborator failures.
#[derive(Debug, Error)]
pub enum CellTrackError {
    /// Two arrays that must share a frame shape do not.
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },
    /// A parameter is outside its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// The linear assignment solver rejected the cost matrix.
    #[error("assignment solver failed: {0}")]
    Assignment(String),
    /// A frame source, predictor or mask store failed.
    #[error("collaborator failed: {0}")]
    Collaborator(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl CellTrackError {
    pub fn collaborator<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Collaborator(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, CellTrackError>;
