use candle_core::Tensor;
use rand::{Rng, RngCore};

use crate::error::DatasetError;

/// Window a paired `(tokens, audio)` down to at most `max_frames`.
///
/// A single uniform offset in `[0, len - max_frames]` is applied to both
/// tensors; applying different offsets would silently desynchronize labels
/// and features. Sequences at or under the limit pass through unchanged;
/// short sequences are never padded here (collation resolves them).
pub fn crop_to_max(
    tokens: &Tensor,
    audio: &Tensor,
    max_frames: usize,
    rng: &mut dyn RngCore,
) -> Result<(Tensor, Tensor), DatasetError> {
    let token_frames = tokens
        .dim(0)
        .map_err(|e| DatasetError::runtime("token length", e))?;
    let audio_frames = audio
        .dim(0)
        .map_err(|e| DatasetError::runtime("audio length", e))?;
    if token_frames != audio_frames {
        return Err(DatasetError::invalid_input(format!(
            "token/audio lengths desynchronized before windowing: {token_frames} vs {audio_frames}"
        )));
    }
    if token_frames <= max_frames {
        return Ok((tokens.clone(), audio.clone()));
    }

    let offset = rng.gen_range(0..=token_frames - max_frames);
    let tokens = tokens
        .narrow(0, offset, max_frames)
        .map_err(|e| DatasetError::runtime("window tokens", e))?;
    let audio = audio
        .narrow(0, offset, max_frames)
        .map_err(|e| DatasetError::runtime("window audio", e))?;
    Ok((tokens, audio))
}

#[cfg(test)]
mod tests {
    use candle_core::{DType, Device};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn paired(frames: usize, channels: usize) -> (Tensor, Tensor) {
        let tokens: Vec<u32> = (0..frames as u32).collect();
        let tokens = Tensor::from_vec(tokens, frames, &Device::Cpu).expect("tokens");
        let audio: Vec<f32> = (0..frames * channels).map(|v| v as f32).collect();
        let audio =
            Tensor::from_vec(audio, (frames, channels), &Device::Cpu).expect("audio");
        (tokens, audio)
    }

    #[test]
    fn long_sequence_is_windowed_to_max() {
        let mut rng = StdRng::seed_from_u64(7);
        let (tokens, audio) = paired(1200, 3);
        let (tokens, audio) = crop_to_max(&tokens, &audio, 1000, &mut rng).expect("crop");
        assert_eq!(tokens.dims(), [1000]);
        assert_eq!(audio.dims(), [1000, 3]);
    }

    #[test]
    fn same_offset_applied_to_both() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let (tokens, audio) = paired(40, 1);
            let (tokens, audio) = crop_to_max(&tokens, &audio, 10, &mut rng).expect("crop");
            let token_start = tokens.to_vec1::<u32>().expect("tokens")[0];
            let audio_start = audio.to_vec2::<f32>().expect("audio")[0][0];
            assert_eq!(token_start as f32, audio_start);
        }
    }

    #[test]
    fn offsets_stay_in_bounds_and_cover_boundaries() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut seen_zero = false;
        let mut seen_max = false;
        for _ in 0..500 {
            let (tokens, audio) = paired(10, 1);
            let (tokens, _) = crop_to_max(&tokens, &audio, 5, &mut rng).expect("crop");
            let offset = tokens.to_vec1::<u32>().expect("tokens")[0] as usize;
            assert!(offset <= 5);
            seen_zero |= offset == 0;
            seen_max |= offset == 5;
        }
        assert!(seen_zero && seen_max);
    }

    #[test]
    fn short_sequence_passes_through_unpadded() {
        let mut rng = StdRng::seed_from_u64(17);
        let (tokens, audio) = paired(8, 2);
        let (tokens, audio) = crop_to_max(&tokens, &audio, 1000, &mut rng).expect("crop");
        assert_eq!(tokens.dims(), [8]);
        assert_eq!(audio.dims(), [8, 2]);
    }

    #[test]
    fn desynchronized_pair_fails() {
        let mut rng = StdRng::seed_from_u64(19);
        let tokens = Tensor::zeros(10, DType::U32, &Device::Cpu).expect("tokens");
        let audio = Tensor::zeros((12, 2), DType::F32, &Device::Cpu).expect("audio");
        assert!(crop_to_max(&tokens, &audio, 8, &mut rng).is_err());
    }
}
