//! Collaborator seams: frame loading, prediction and mask persistence.

use ndarray::{Array2, ArrayView2};

use crate::labels::{LabelMask, ProbabilityMap};

/// Source of raw microscope frames.
///
/// # Example
///
/// ```ignore
/// use celltrack_rs::integration::FrameSource;
///
/// struct TiffFolder { /* ... */ }
///
/// impl FrameSource for TiffFolder {
///     type Error = std::io::Error;
///
///     fn load_frame(&mut self, time: usize, fov: usize) -> Result<Array2<f32>, Self::Error> {
///         // Decode the file for (time, fov)
///     }
/// }
/// ```
pub trait FrameSource {
    /// Error type for loading failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Loads the raw image of one field of view at one time point.
    ///
    /// May return an all-zero frame when nothing was recorded.
    fn load_frame(&mut self, time: usize, fov: usize) -> Result<Array2<f32>, Self::Error>;
}

/// Persistent storage of label masks, one per `(time, fov)`.
pub trait MaskStore {
    /// Error type for storage failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the stored mask, or `None` if the frame was never segmented.
    fn load_mask(&self, time: usize, fov: usize) -> Result<Option<LabelMask>, Self::Error>;

    /// Stores a mask, overwriting any previous content.
    fn save_mask(&mut self, time: usize, fov: usize, mask: &LabelMask) -> Result<(), Self::Error>;
}

/// Black-box cell probability predictor (the segmentation network).
pub trait Predictor {
    /// Error type for inference failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Per-pixel cell probability of the same shape as `image`.
    fn predict(&mut self, image: ArrayView2<f32>) -> Result<ProbabilityMap, Self::Error>;
}

/// Plain functions and closures act as infallible predictors.
impl<F> Predictor for F
where
    F: FnMut(ArrayView2<f32>) -> ProbabilityMap,
{
    type Error = std::convert::Infallible;

    fn predict(&mut self, image: ArrayView2<f32>) -> Result<ProbabilityMap, Self::Error> {
        Ok(self(image))
    }
}
