//! Batch pipeline combining prediction, segmentation and tracking.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::{FrameSource, MaskStore, Predictor};
use crate::error::{CellTrackError, Result};
use crate::labels::{LabelMask, ensure_same_shape};
use crate::segmentation::{SegmentConfig, segment, threshold};
use crate::tracker::{CorrespondenceConfig, correspond_with};

/// Configuration of a [`SegmentationPipeline`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Fixed probability cutoff, isodata when `None`.
    pub threshold: Option<f32>,
    pub segment: SegmentConfig,
    pub correspondence: CorrespondenceConfig,
    /// Relabel every new segmentation against the previous frame.
    pub track: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threshold: None,
            segment: SegmentConfig::default(),
            correspondence: CorrespondenceConfig::default(),
            track: true,
        }
    }
}

/// Drives `load -> predict -> threshold -> segment -> track -> save` over
/// fields of view and time ranges.
pub struct SegmentationPipeline<F, P, M>
where
    F: FrameSource,
    P: Predictor,
    M: MaskStore,
{
    source: F,
    predictor: P,
    store: M,
    config: PipelineConfig,
}

impl<F, P, M> SegmentationPipeline<F, P, M>
where
    F: FrameSource,
    P: Predictor,
    M: MaskStore,
{
    pub fn new(source: F, predictor: P, store: M, config: PipelineConfig) -> Self {
        Self {
            source,
            predictor,
            store,
            config,
        }
    }

    pub fn with_default_config(source: F, predictor: P, store: M) -> Self {
        Self::new(source, predictor, store, PipelineConfig::default())
    }

    /// Segments one frame without touching the store.
    pub fn segment_frame(&mut self, time: usize, fov: usize) -> Result<LabelMask> {
        let image = self
            .source
            .load_frame(time, fov)
            .map_err(CellTrackError::collaborator)?;
        let probability = self
            .predictor
            .predict(image.view())
            .map_err(CellTrackError::collaborator)?;
        ensure_same_shape(&image.view(), &probability.view())?;

        let binary = threshold(probability.view(), self.config.threshold);
        segment(binary.view(), probability.view(), &self.config.segment)
    }

    /// Relabels the stored mask at `time` against the one at `time - 1`.
    ///
    /// Without a previous mask the current one is returned unchanged; without
    /// a current mask the result is blank.
    pub fn track_frame(&mut self, time: usize, fov: usize) -> Result<LabelMask> {
        let current = self.load_mask(time, fov)?;
        let previous = match time.checked_sub(1) {
            Some(t) => self.load_mask(t, fov)?,
            None => None,
        };

        match (previous, current) {
            (Some(prev), Some(next)) => {
                correspond_with(prev.view(), next.view(), &self.config.correspondence)
            }
            (None, Some(next)) => {
                if time > 0 {
                    warn!("no mask at time {} in FOV {fov}, keeping time {time} as is", time - 1);
                }
                Ok(next)
            }
            (Some(prev), None) => {
                warn!("no mask at time {time} in FOV {fov}, returning a blank mask");
                Ok(LabelMask::zeros(prev.dim()))
            }
            (None, None) => {
                warn!("no masks around time {time} in FOV {fov}, returning a blank mask");
                let frame = self
                    .source
                    .load_frame(time, fov)
                    .map_err(CellTrackError::collaborator)?;
                Ok(LabelMask::zeros(frame.dim()))
            }
        }
    }

    /// Segments, stores, tracks and stores again one frame.
    pub fn process_frame(&mut self, time: usize, fov: usize) -> Result<LabelMask> {
        let mask = self.segment_frame(time, fov)?;
        self.save_mask(time, fov, &mask)?;
        if !self.config.track {
            return Ok(mask);
        }

        let tracked = self.track_frame(time, fov)?;
        self.save_mask(time, fov, &tracked)?;
        Ok(tracked)
    }

    /// Processes every FOV over the inclusive time range.
    pub fn run(&mut self, fovs: &[usize], first_time: usize, last_time: usize) -> Result<()> {
        check_time_range(first_time, last_time)?;
        for &fov in fovs {
            info!("segmenting FOV {fov}, frames {first_time}..={last_time}");
            for time in first_time..=last_time {
                let mask = self.process_frame(time, fov)?;
                debug!(
                    "FOV {fov} time {time}: {} labelled pixels",
                    mask.iter().filter(|&&v| v > 0).count()
                );
            }
        }
        Ok(())
    }

    /// Re-tracks already stored masks over the inclusive time range.
    pub fn retrack(&mut self, fov: usize, first_time: usize, last_time: usize) -> Result<()> {
        check_time_range(first_time, last_time)?;
        info!("retracking FOV {fov}, frames {first_time}..={last_time}");
        for time in first_time..=last_time {
            let tracked = self.track_frame(time, fov)?;
            self.save_mask(time, fov, &tracked)?;
        }
        Ok(())
    }

    fn load_mask(&self, time: usize, fov: usize) -> Result<Option<LabelMask>> {
        self.store
            .load_mask(time, fov)
            .map_err(CellTrackError::collaborator)
    }

    fn save_mask(&mut self, time: usize, fov: usize, mask: &LabelMask) -> Result<()> {
        self.store
            .save_mask(time, fov, mask)
            .map_err(CellTrackError::collaborator)
    }

    /// Get a reference to the pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Get a reference to the frame source.
    pub fn source(&self) -> &F {
        &self.source
    }

    /// Get a mutable reference to the predictor.
    pub fn predictor_mut(&mut self) -> &mut P {
        &mut self.predictor
    }

    /// Get a reference to the mask store.
    pub fn store(&self) -> &M {
        &self.store
    }

    /// Get a mutable reference to the mask store.
    pub fn store_mut(&mut self) -> &mut M {
        &mut self.store
    }

    /// Consumes the pipeline and returns the mask store.
    pub fn into_store(self) -> M {
        self.store
    }
}

fn check_time_range(first_time: usize, last_time: usize) -> Result<()> {
    if first_time > last_time {
        return Err(CellTrackError::InvalidParameter(format!(
            "invalid time range {first_time}..={last_time}"
        )));
    }
    Ok(())
}
