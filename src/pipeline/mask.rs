use candle_core::{Device, Tensor};
use rand::{Rng, RngCore};

use crate::config::MaskConfig;
use crate::error::DatasetError;

/// Stochastic infill mask over a token frame sequence.
///
/// With `probability`, one contiguous run covering `min_coverage..max_coverage`
/// of the frames is hidden (0) at a uniformly random offset; otherwise every
/// frame stays visible (1). Randomness is drawn fresh per call so repeated
/// epochs see independent masks for the same example.
#[derive(Debug, Clone)]
pub struct MaskPolicy {
    config: MaskConfig,
}

impl MaskPolicy {
    pub fn new(config: MaskConfig) -> Self {
        Self { config }
    }

    /// Decide the hidden `[start, end)` span, if any, for `length` frames.
    pub fn sample_span(&self, length: usize, rng: &mut dyn RngCore) -> Option<(usize, usize)> {
        if length == 0 || rng.gen::<f64>() >= self.config.probability {
            return None;
        }
        let coverage = rng.gen_range(self.config.min_coverage..self.config.max_coverage);
        let offset = rng.gen_range(0.0..=(1.0 - coverage));
        let start = (offset * length as f64).floor() as usize;
        let end = (((offset + coverage) * length as f64).floor() as usize).min(length);
        Some((start, end))
    }

    /// Build the `[length]` u8 visibility mask tensor.
    pub fn sample(
        &self,
        length: usize,
        device: &Device,
        rng: &mut dyn RngCore,
    ) -> Result<Tensor, DatasetError> {
        let mut mask = vec![1u8; length];
        if let Some((start, end)) = self.sample_span(length, rng) {
            for slot in &mut mask[start..end] {
                *slot = 0;
            }
        }
        Tensor::from_vec(mask, length, device)
            .map_err(|e| DatasetError::runtime("build mask tensor", e))
    }
}
