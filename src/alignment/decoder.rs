use crate::error::DatasetError;
use crate::pipeline::traits::PhonemeTokenizer;
use crate::types::AlignmentInterval;

/// Label used by forced aligners for unintelligible/spoken-noise spans.
pub const SPOKEN_NOISE_LABEL: &str = "spn";

/// Convert a sparse interval alignment into `(symbols, frame_durations)`.
///
/// Each interval contributes `floor((end - running_time) / phoneme_duration)`
/// frames, where `running_time` is the previous interval's end; gaps between
/// intervals are absorbed into the following interval's duration. Empty
/// labels resolve to the tokenizer's silence symbol and [`SPOKEN_NOISE_LABEL`]
/// to its unknown symbol. An interval shorter than one frame contributes
/// zero frames, which is expected and not an error.
pub fn decode_intervals(
    intervals: &[AlignmentInterval],
    phoneme_duration: f64,
    tokenizer: &dyn PhonemeTokenizer,
) -> Result<(Vec<String>, Vec<usize>), DatasetError> {
    if !(phoneme_duration > 0.0) {
        return Err(DatasetError::invalid_input(format!(
            "phoneme_duration must be positive, got {phoneme_duration}"
        )));
    }

    let mut symbols = Vec::with_capacity(intervals.len());
    let mut durations = Vec::with_capacity(intervals.len());
    let mut running_time = 0.0f64;

    for interval in intervals {
        if interval.end_time < running_time {
            return Err(DatasetError::invalid_input(format!(
                "non-monotonic alignment: interval ending at {}s follows {}s",
                interval.end_time, running_time
            )));
        }
        let frames = ((interval.end_time - running_time) / phoneme_duration).floor() as usize;
        running_time = interval.end_time;

        let symbol = match interval.label.as_deref() {
            None | Some("") => tokenizer.silence_symbol().to_string(),
            Some(SPOKEN_NOISE_LABEL) => tokenizer.unknown_symbol().to_string(),
            Some(label) => label.to_string(),
        };
        symbols.push(symbol);
        durations.push(frames);
    }

    Ok((symbols, durations))
}

/// Expand `(symbol, duration)` pairs into a dense frame-rate token sequence.
pub fn expand_frames(symbols: &[String], durations: &[usize]) -> Vec<String> {
    debug_assert_eq!(symbols.len(), durations.len());
    let total: usize = durations.iter().sum();
    let mut frames = Vec::with_capacity(total);
    for (symbol, &count) in symbols.iter().zip(durations) {
        for _ in 0..count {
            frames.push(symbol.clone());
        }
    }
    frames
}
