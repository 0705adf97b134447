use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use candle_core::Device;
use rand::RngCore;

use crate::alignment::decoder::{decode_intervals, expand_frames};
use crate::alignment::textgrid::read_phone_intervals;
use crate::config::DataConfig;
use crate::error::DatasetError;
use crate::pipeline::crop::crop_to_max;
use crate::pipeline::mask::MaskPolicy;
use crate::pipeline::traits::{ExampleSource, PhonemeTokenizer};
use crate::sources::load_features;
use crate::types::{AlignmentInterval, Example};

struct Utterance {
    intervals: Vec<AlignmentInterval>,
    duration_seconds: f64,
    feature_path: PathBuf,
}

/// Paired alignment + audio-feature source.
///
/// TextGrids are parsed once at construction and utterances ordered by
/// descending duration (ascending feature path tiebreak), a curriculum that
/// groups similar lengths so crop-to-shortest collation discards little.
pub struct AlignedSource {
    utterances: Vec<Utterance>,
    tokenizer: Arc<dyn PhonemeTokenizer>,
    mask: Option<MaskPolicy>,
    config: DataConfig,
    device: Device,
}

impl AlignedSource {
    /// Discover `*.TextGrid` files under `aligned_dir`, pairing each with the
    /// `<stem>.safetensors` feature file at the same relative path under
    /// `prepared_dir`.
    pub fn discover(
        aligned_dir: &Path,
        prepared_dir: &Path,
        tokenizer: Arc<dyn PhonemeTokenizer>,
        config: DataConfig,
    ) -> Result<Self, DatasetError> {
        let mut grids = Vec::new();
        collect_textgrid_files(aligned_dir, &mut grids)?;
        grids.sort();
        if grids.is_empty() {
            return Err(DatasetError::invalid_input(format!(
                "no TextGrid files found under '{}'",
                aligned_dir.display()
            )));
        }

        let pairs = grids
            .into_iter()
            .map(|grid| {
                let relative = grid.strip_prefix(aligned_dir).map_err(|e| {
                    DatasetError::runtime("relativize TextGrid path", e)
                })?;
                let feature_path = prepared_dir.join(relative).with_extension("safetensors");
                Ok((grid, feature_path))
            })
            .collect::<Result<Vec<_>, DatasetError>>()?;
        Self::from_pairs(pairs, tokenizer, config)
    }

    /// Build from explicit `(TextGrid path, feature path)` pairs.
    pub fn from_pairs(
        pairs: Vec<(PathBuf, PathBuf)>,
        tokenizer: Arc<dyn PhonemeTokenizer>,
        config: DataConfig,
    ) -> Result<Self, DatasetError> {
        if pairs.is_empty() {
            return Err(DatasetError::invalid_input(
                "aligned source needs at least one utterance",
            ));
        }
        let device = config.resolve_device()?;

        let mut utterances = Vec::with_capacity(pairs.len());
        for (grid_path, feature_path) in pairs {
            let (intervals, duration_seconds) = read_phone_intervals(&grid_path)?;
            utterances.push(Utterance {
                intervals,
                duration_seconds,
                feature_path,
            });
        }
        utterances.sort_by(|a, b| {
            b.duration_seconds
                .total_cmp(&a.duration_seconds)
                .then_with(|| a.feature_path.cmp(&b.feature_path))
        });

        let mask = config.mask.clone().map(MaskPolicy::new);
        Ok(Self {
            utterances,
            tokenizer,
            mask,
            config,
            device,
        })
    }
}

impl ExampleSource for AlignedSource {
    type Item = Example;

    fn len(&self) -> usize {
        self.utterances.len()
    }

    fn get(&self, index: usize, rng: &mut dyn RngCore) -> Result<Example, DatasetError> {
        let utterance = self.utterances.get(index).ok_or_else(|| {
            DatasetError::invalid_input(format!(
                "index {index} out of range for {} utterances",
                self.utterances.len()
            ))
        })?;

        let (symbols, durations) = decode_intervals(
            &utterance.intervals,
            self.config.phoneme_duration,
            self.tokenizer.as_ref(),
        )?;
        let frames = expand_frames(&symbols, &durations);

        let audio = load_features(&utterance.feature_path, &self.device)?;
        let audio_frames = audio
            .dim(0)
            .map_err(|e| DatasetError::runtime("audio length", e))?;
        if audio_frames < frames.len() {
            // Padding here would fabricate features for real tokens.
            return Err(DatasetError::invalid_input(format!(
                "'{}': {audio_frames} audio frames < {} token frames",
                utterance.feature_path.display(),
                frames.len()
            )));
        }
        if audio_frames > frames.len() {
            tracing::debug!(
                excess = audio_frames - frames.len(),
                path = %utterance.feature_path.display(),
                "discarding trailing audio frames beyond token length"
            );
        }
        let audio = audio
            .narrow(0, 0, frames.len())
            .map_err(|e| DatasetError::runtime("truncate audio", e))?;

        let tokens = self.tokenizer.encode(&frames, &self.device)?;
        let (tokens, audio) = crop_to_max(&tokens, &audio, self.config.max_frames, rng)?;

        let mask = match &self.mask {
            Some(policy) => {
                let length = tokens
                    .dim(0)
                    .map_err(|e| DatasetError::runtime("token length", e))?;
                Some(policy.sample(length, &self.device, rng)?)
            }
            None => None,
        };

        Ok(Example {
            tokens,
            audio,
            mask,
        })
    }
}

fn collect_textgrid_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), DatasetError> {
    let entries = fs::read_dir(dir).map_err(|e| DatasetError::io("read aligned directory", e))?;
    for entry in entries {
        let entry = entry.map_err(|e| DatasetError::io("read aligned directory entry", e))?;
        let path = entry.path();
        if path.is_dir() {
            collect_textgrid_files(&path, out)?;
            continue;
        }
        if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("TextGrid"))
        {
            out.push(path);
        }
    }
    Ok(())
}
