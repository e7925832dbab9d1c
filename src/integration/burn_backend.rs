//! Burn inference backend for cell probability prediction.
//!
//! This module provides a `BurnPredictor` that implements `Predictor`
//! for running segmentation networks built with the Burn framework.
//!
//! # Example
//!
//! ```ignore
//! use celltrack_rs::integration::{BurnModel, BurnPredictor};
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//!
//! // Implement BurnModel for your segmentation network
//! struct MyUNet { /* ... */ }
//!
//! impl BurnModel<NdArray> for MyUNet {
//!     fn forward(&self, input: Tensor<NdArray, 4>) -> Tensor<NdArray, 4> {
//!         // Run inference
//!     }
//! }
//!
//! let model = MyUNet::load("weights.bin");
//! let predictor = BurnPredictor::new(model, Default::default());
//! ```

use burn::prelude::*;
use burn::tensor::Tensor;
use ndarray::{Array2, ArrayView2, s};
use thiserror::Error;

use super::Predictor;
use crate::labels::ProbabilityMap;

/// Error type for Burn prediction failures.
#[derive(Debug, Clone, Error)]
pub enum BurnPredictorError {
    /// Input image has no pixels.
    #[error("input image is empty")]
    EmptyImage,
    /// The network returned a tensor of unexpected shape.
    #[error("invalid output shape: expected {expected:?}, got {got:?}")]
    InvalidOutputShape {
        expected: [usize; 4],
        got: [usize; 4],
    },
    /// Output tensor could not be read back.
    #[error("postprocessing error: {0}")]
    PostprocessingError(String),
}

/// Trait for Burn-based segmentation networks.
///
/// Implement this trait for your specific model architecture.
pub trait BurnModel<B: Backend>: Send + Sync {
    /// Run forward pass on the input tensor.
    ///
    /// # Arguments
    /// * `input` - Input tensor of shape [batch, 1, height, width]
    ///
    /// # Returns
    /// Cell probability tensor of the same shape.
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4>;

    /// Height and width must be multiples of this value.
    fn size_divisor(&self) -> usize {
        16 // Four 2x poolings in a standard U-Net
    }
}

/// Burn-based predictor implementing `Predictor`.
pub struct BurnPredictor<B: Backend, M: BurnModel<B>> {
    model: M,
    device: B::Device,
}

impl<B: Backend, M: BurnModel<B>> BurnPredictor<B, M> {
    /// Create a new Burn predictor with the given model and device.
    pub fn new(model: M, device: B::Device) -> Self {
        Self { model, device }
    }

    /// Normalise the image to `[0, 1]` and zero-pad it to the model's size
    /// divisor.
    ///
    /// Returns the `[1, 1, H', W']` tensor.
    pub fn preprocess(&self, image: ArrayView2<f32>) -> Result<Tensor<B, 4>, BurnPredictorError> {
        let (height, width) = image.dim();
        if height == 0 || width == 0 {
            return Err(BurnPredictorError::EmptyImage);
        }

        let (min, max) = image
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range = if max > min { max - min } else { 1.0 };

        let (padded_h, padded_w) = self.padded_dim(height, width);
        let mut padded = Array2::<f32>::zeros((padded_h, padded_w));
        padded
            .slice_mut(s![..height, ..width])
            .assign(&image.mapv(|v| (v - min) / range));

        let data: Vec<f32> = padded.iter().copied().collect();
        let tensor = Tensor::<B, 1>::from_floats(data.as_slice(), &self.device)
            .reshape([1, 1, padded_h, padded_w]);

        Ok(tensor)
    }

    /// Crop the network output back to the input frame.
    fn postprocess(
        &self,
        output: Tensor<B, 4>,
        (height, width): (usize, usize),
    ) -> Result<ProbabilityMap, BurnPredictorError> {
        let (padded_h, padded_w) = self.padded_dim(height, width);
        let expected = [1, 1, padded_h, padded_w];
        let got = output.dims();
        if got != expected {
            return Err(BurnPredictorError::InvalidOutputShape { expected, got });
        }

        let values = output
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| BurnPredictorError::PostprocessingError(format!("{e:?}")))?;
        let full = Array2::from_shape_vec((padded_h, padded_w), values)
            .map_err(|e| BurnPredictorError::PostprocessingError(e.to_string()))?;

        Ok(full.slice(s![..height, ..width]).to_owned())
    }

    fn padded_dim(&self, height: usize, width: usize) -> (usize, usize) {
        let d = self.model.size_divisor().max(1);
        (height.div_ceil(d) * d, width.div_ceil(d) * d)
    }
}

impl<B: Backend, M: BurnModel<B>> Predictor for BurnPredictor<B, M> {
    type Error = BurnPredictorError;

    fn predict(&mut self, image: ArrayView2<f32>) -> Result<ProbabilityMap, Self::Error> {
        let tensor = self.preprocess(image)?;
        let output = self.model.forward(tensor);
        self.postprocess(output, image.dim())
    }
}
