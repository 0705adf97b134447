use std::path::Path;
use std::sync::Arc;

use candle_core::{Device, Tensor};
use rand::RngCore;
use serde::Deserialize;

use crate::error::DatasetError;
use crate::pipeline::traits::{ExampleSource, PhonemeTokenizer};
use crate::types::DurationExample;

#[derive(Debug, Deserialize)]
struct UtteranceRecord {
    w: Vec<WordSpan>,
}

#[derive(Debug, Deserialize)]
struct WordSpan {
    /// `null` marks an inter-word silence gap.
    w: Option<String>,
    t: [f64; 2],
    #[serde(default)]
    p: Vec<PhoneSpan>,
}

#[derive(Debug, Deserialize)]
struct PhoneSpan {
    p: Option<String>,
    t: [f64; 2],
}

/// Pre-extracted word/phone timing records, one JSON object per line.
///
/// Produces token/duration *targets* for duration modeling: explicit gaps
/// become a silence token spanning the gap, and adjacent words with no gap
/// between them get a zero-duration silence token as a boundary marker.
pub struct PhoneRecordSource {
    lines: Vec<String>,
    tokenizer: Arc<dyn PhonemeTokenizer>,
    phoneme_duration: f64,
    device: Device,
}

impl PhoneRecordSource {
    pub fn new(
        path: &Path,
        tokenizer: Arc<dyn PhonemeTokenizer>,
        phoneme_duration: f64,
        device: Device,
    ) -> Result<Self, DatasetError> {
        if !(phoneme_duration > 0.0) {
            return Err(DatasetError::invalid_input(format!(
                "phoneme_duration must be positive, got {phoneme_duration}"
            )));
        }
        let contents =
            std::fs::read_to_string(path).map_err(|e| DatasetError::io("read record file", e))?;
        let lines: Vec<String> = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();
        if lines.is_empty() {
            return Err(DatasetError::invalid_input(format!(
                "record file '{}' holds no utterances",
                path.display()
            )));
        }
        Ok(Self {
            lines,
            tokenizer,
            phoneme_duration,
            device,
        })
    }

    fn round_frames(&self, span_seconds: f64) -> Result<u32, DatasetError> {
        if !(span_seconds >= 0.0) {
            return Err(DatasetError::invalid_input(format!(
                "negative timing span of {span_seconds}s in record"
            )));
        }
        Ok((span_seconds / self.phoneme_duration).round() as u32)
    }
}

impl ExampleSource for PhoneRecordSource {
    type Item = DurationExample;

    fn len(&self) -> usize {
        self.lines.len()
    }

    fn get(&self, index: usize, _rng: &mut dyn RngCore) -> Result<DurationExample, DatasetError> {
        let line = self.lines.get(index).ok_or_else(|| {
            DatasetError::invalid_input(format!(
                "index {index} out of range for {} records",
                self.lines.len()
            ))
        })?;
        let record: UtteranceRecord = serde_json::from_str(line)
            .map_err(|e| DatasetError::json("parse phone record line", e))?;

        let mut symbols = Vec::new();
        let mut durations: Vec<u32> = Vec::new();
        let mut last_silence = true;
        for word in &record.w {
            let [start, end] = word.t;
            match &word.w {
                None => {
                    symbols.push(self.tokenizer.silence_symbol().to_string());
                    durations.push(self.round_frames(end - start)?);
                    last_silence = true;
                }
                Some(_) => {
                    if !last_silence {
                        // Word boundary with no audible gap.
                        symbols.push(self.tokenizer.silence_symbol().to_string());
                        durations.push(0);
                    }
                    last_silence = false;
                    for phone in &word.p {
                        let Some(symbol) = &phone.p else { continue };
                        symbols.push(symbol.clone());
                        durations.push(self.round_frames(phone.t[1] - phone.t[0])?);
                    }
                }
            }
        }

        let tokens = self.tokenizer.encode(&symbols, &self.device)?;
        let durations = Tensor::from_vec(durations, symbols.len(), &self.device)
            .map_err(|e| DatasetError::runtime("build duration tensor", e))?;
        Ok(DurationExample { tokens, durations })
    }
}
