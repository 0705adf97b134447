use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

use crate::error::DatasetError;
use crate::manifest::{read_manifest, ManifestEntry};
use crate::pipeline::traits::ExampleSource;
use crate::sources::load_features;
use crate::types::Example;

/// Audio-only source over a duration manifest, for pretraining without
/// alignments: tokens are synthesized as all-zero ids.
///
/// Traversal order is shuffled once at construction. Unlike the aligned
/// path, audio shorter than the segment is zero-padded here; with no token
/// sequence to crop against, a fixed segment size is the only shape
/// contract this source can offer.
pub struct FlatSource {
    entries: Vec<ManifestEntry>,
    segment_frames: usize,
    device: Device,
}

impl FlatSource {
    pub fn new(
        manifest_path: &Path,
        segment_frames: usize,
        device: Device,
        rng: &mut dyn RngCore,
    ) -> Result<Self, DatasetError> {
        if segment_frames == 0 {
            return Err(DatasetError::invalid_input("segment size must be >= 1"));
        }
        let mut entries = read_manifest(manifest_path)?;
        if entries.is_empty() {
            return Err(DatasetError::invalid_input(format!(
                "manifest '{}' lists no files",
                manifest_path.display()
            )));
        }
        entries.shuffle(rng);
        Ok(Self {
            entries,
            segment_frames,
            device,
        })
    }

    /// Manifests index raw audio; features live in a sibling safetensors
    /// file sharing the path stem.
    fn feature_path(entry: &ManifestEntry) -> PathBuf {
        entry.path.with_extension("safetensors")
    }
}

impl ExampleSource for FlatSource {
    type Item = Example;

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn get(&self, index: usize, rng: &mut dyn RngCore) -> Result<Example, DatasetError> {
        let entry = self.entries.get(index).ok_or_else(|| {
            DatasetError::invalid_input(format!(
                "index {index} out of range for {} manifest entries",
                self.entries.len()
            ))
        })?;

        let audio = load_features(&Self::feature_path(entry), &self.device)?;
        let frames = audio
            .dim(0)
            .map_err(|e| DatasetError::runtime("audio length", e))?;

        let audio = if frames >= self.segment_frames {
            let offset = rng.gen_range(0..=frames - self.segment_frames);
            audio
                .narrow(0, offset, self.segment_frames)
                .map_err(|e| DatasetError::runtime("window audio", e))?
        } else {
            let channels = audio
                .dim(1)
                .map_err(|e| DatasetError::runtime("audio channels", e))?;
            let pad = Tensor::zeros(
                (self.segment_frames - frames, channels),
                audio.dtype(),
                &self.device,
            )
            .map_err(|e| DatasetError::runtime("build audio padding", e))?;
            Tensor::cat(&[&audio, &pad], 0)
                .map_err(|e| DatasetError::runtime("pad audio", e))?
        };

        let tokens = Tensor::zeros(self.segment_frames, DType::U32, &self.device)
            .map_err(|e| DatasetError::runtime("build zero tokens", e))?;
        Ok(Example {
            tokens,
            audio,
            mask: None,
        })
    }
}
