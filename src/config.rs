use candle_core::Device;

use crate::error::DatasetError;

#[derive(Debug, Clone)]
pub struct DataConfig {
    /// Seconds per token frame; sparse alignments are densified at this rate.
    pub phoneme_duration: f64,
    /// Maximum frames per example; longer examples are windowed down.
    pub max_frames: usize,
    pub device: String,
    /// Infill masking; `None` produces examples without a mask tensor.
    pub mask: Option<MaskConfig>,
}

impl DataConfig {
    pub const DEFAULT_PHONEME_DURATION: f64 = 0.01;
    pub const DEFAULT_MAX_FRAMES: usize = 1000;

    pub fn resolve_device(&self) -> Result<Device, DatasetError> {
        match self.device.as_str() {
            "cuda" => Device::new_cuda(0).map_err(|e| DatasetError::runtime("CUDA init", e)),
            _ => Ok(Device::Cpu),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            phoneme_duration: Self::DEFAULT_PHONEME_DURATION,
            max_frames: Self::DEFAULT_MAX_FRAMES,
            device: "cpu".to_string(),
            mask: None,
        }
    }
}

/// Parameters of the stochastic infill mask. A masked example gets exactly
/// one contiguous hidden run covering `min_coverage..max_coverage` of its
/// frames at a uniformly random offset.
#[derive(Debug, Clone)]
pub struct MaskConfig {
    pub probability: f64,
    pub min_coverage: f64,
    pub max_coverage: f64,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            probability: 0.3,
            min_coverage: 0.7,
            max_coverage: 1.0,
        }
    }
}
