//! In-memory frame source and mask store.

use std::collections::HashMap;
use std::convert::Infallible;

use ndarray::Array2;

use super::{FrameSource, MaskStore};
use crate::labels::LabelMask;

/// Keeps frames and masks of every `(time, fov)` in hash maps.
///
/// Missing frames load as all-zero images of the configured shape.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    shape: (usize, usize),
    frames: HashMap<(usize, usize), Array2<f32>>,
    masks: HashMap<(usize, usize), LabelMask>,
}

impl InMemoryStore {
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            shape: (height, width),
            frames: HashMap::new(),
            masks: HashMap::new(),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Adds a raw frame.
    pub fn with_frame(mut self, time: usize, fov: usize, frame: Array2<f32>) -> Self {
        self.frames.insert((time, fov), frame);
        self
    }

    /// Adds a mask, as if it had been annotated by hand.
    pub fn with_mask(mut self, time: usize, fov: usize, mask: LabelMask) -> Self {
        self.masks.insert((time, fov), mask);
        self
    }

    pub fn mask(&self, time: usize, fov: usize) -> Option<&LabelMask> {
        self.masks.get(&(time, fov))
    }
}

impl FrameSource for InMemoryStore {
    type Error = Infallible;

    fn load_frame(&mut self, time: usize, fov: usize) -> Result<Array2<f32>, Self::Error> {
        Ok(self
            .frames
            .get(&(time, fov))
            .cloned()
            .unwrap_or_else(|| Array2::zeros(self.shape)))
    }
}

impl MaskStore for InMemoryStore {
    type Error = Infallible;

    fn load_mask(&self, time: usize, fov: usize) -> Result<Option<LabelMask>, Self::Error> {
        Ok(self.masks.get(&(time, fov)).cloned())
    }

    fn save_mask(&mut self, time: usize, fov: usize, mask: &LabelMask) -> Result<(), Self::Error> {
        self.masks.insert((time, fov), mask.clone());
        Ok(())
    }
}
