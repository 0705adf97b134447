use candle_core::Tensor;
use rand::{Rng, RngCore};

use crate::error::DatasetError;
use crate::types::{Batch, DurationBatch, DurationExample, Example};

/// A collatable item: equal-length sequence tensors that can be windowed
/// together and stacked along a new batch dimension.
pub trait BatchItem: Sized + Send {
    type Batch;

    fn seq_len(&self) -> Result<usize, DatasetError>;

    /// Crop every component tensor to the same `[offset, offset + len)` window.
    fn window(&self, offset: usize, len: usize) -> Result<Self, DatasetError>;

    fn stack(items: &[Self]) -> Result<Self::Batch, DatasetError>;
}

/// Collate items by cropping each to the batch's shortest sequence length.
///
/// `L = min(len)` is recomputed per batch; items longer than `L` get a fresh
/// uniform window offset in `[0, len - L]`, items at `L` pass through. No
/// item is ever padded, so no pad constant can leak into the loss.
pub fn collate_to_shortest<T: BatchItem>(
    items: &[T],
    rng: &mut dyn RngCore,
) -> Result<T::Batch, DatasetError> {
    if items.is_empty() {
        return Err(DatasetError::invalid_input("cannot collate an empty batch"));
    }

    let mut min_len = usize::MAX;
    for item in items {
        min_len = min_len.min(item.seq_len()?);
    }

    let mut windowed = Vec::with_capacity(items.len());
    for item in items {
        let len = item.seq_len()?;
        let offset = if len > min_len {
            rng.gen_range(0..=len - min_len)
        } else {
            0
        };
        windowed.push(item.window(offset, min_len)?);
    }
    T::stack(&windowed)
}

impl BatchItem for Example {
    type Batch = Batch;

    fn seq_len(&self) -> Result<usize, DatasetError> {
        self.tokens
            .dim(0)
            .map_err(|e| DatasetError::runtime("token length", e))
    }

    fn window(&self, offset: usize, len: usize) -> Result<Self, DatasetError> {
        let audio_frames = self
            .audio
            .dim(0)
            .map_err(|e| DatasetError::runtime("audio length", e))?;
        if audio_frames < self.seq_len()? {
            return Err(DatasetError::invalid_input(format!(
                "audio shorter than tokens at collation: {audio_frames} < {}",
                self.seq_len()?
            )));
        }
        let tokens = self
            .tokens
            .narrow(0, offset, len)
            .map_err(|e| DatasetError::runtime("window tokens", e))?;
        let audio = self
            .audio
            .narrow(0, offset, len)
            .map_err(|e| DatasetError::runtime("window audio", e))?;
        let mask = self
            .mask
            .as_ref()
            .map(|mask| {
                mask.narrow(0, offset, len)
                    .map_err(|e| DatasetError::runtime("window mask", e))
            })
            .transpose()?;
        Ok(Example {
            tokens,
            audio,
            mask,
        })
    }

    fn stack(items: &[Self]) -> Result<Batch, DatasetError> {
        let tokens: Vec<&Tensor> = items.iter().map(|item| &item.tokens).collect();
        let audio: Vec<&Tensor> = items.iter().map(|item| &item.audio).collect();
        let masks: Vec<&Tensor> = items.iter().filter_map(|item| item.mask.as_ref()).collect();

        let mask = if masks.is_empty() {
            None
        } else if masks.len() == items.len() {
            Some(
                Tensor::stack(&masks, 0)
                    .map_err(|e| DatasetError::runtime("stack masks", e))?,
            )
        } else {
            return Err(DatasetError::invalid_input(
                "mixed mask presence within a batch",
            ));
        };

        Ok(Batch {
            tokens: Tensor::stack(&tokens, 0)
                .map_err(|e| DatasetError::runtime("stack tokens", e))?,
            audio: Tensor::stack(&audio, 0)
                .map_err(|e| DatasetError::runtime("stack audio", e))?,
            mask,
        })
    }
}

impl BatchItem for DurationExample {
    type Batch = DurationBatch;

    fn seq_len(&self) -> Result<usize, DatasetError> {
        self.tokens
            .dim(0)
            .map_err(|e| DatasetError::runtime("token length", e))
    }

    fn window(&self, offset: usize, len: usize) -> Result<Self, DatasetError> {
        let tokens = self
            .tokens
            .narrow(0, offset, len)
            .map_err(|e| DatasetError::runtime("window tokens", e))?;
        let durations = self
            .durations
            .narrow(0, offset, len)
            .map_err(|e| DatasetError::runtime("window durations", e))?;
        Ok(DurationExample { tokens, durations })
    }

    fn stack(items: &[Self]) -> Result<DurationBatch, DatasetError> {
        let tokens: Vec<&Tensor> = items.iter().map(|item| &item.tokens).collect();
        let durations: Vec<&Tensor> = items.iter().map(|item| &item.durations).collect();
        Ok(DurationBatch {
            tokens: Tensor::stack(&tokens, 0)
                .map_err(|e| DatasetError::runtime("stack tokens", e))?,
            durations: Tensor::stack(&durations, 0)
                .map_err(|e| DatasetError::runtime("stack durations", e))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use candle_core::{DType, Device};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    const PAD_SENTINEL: f32 = -9999.0;

    fn example(frames: usize, channels: usize, with_mask: bool) -> Example {
        let tokens: Vec<u32> = (1..=frames as u32).collect();
        let tokens = Tensor::from_vec(tokens, frames, &Device::Cpu).expect("tokens");
        let audio: Vec<f32> = (0..frames * channels).map(|v| 1.0 + v as f32).collect();
        let audio = Tensor::from_vec(audio, (frames, channels), &Device::Cpu).expect("audio");
        let mask = with_mask
            .then(|| Tensor::ones(frames, DType::U8, &Device::Cpu).expect("mask"));
        Example {
            tokens,
            audio,
            mask,
        }
    }

    #[test]
    fn collates_to_shortest_length() {
        let mut rng = StdRng::seed_from_u64(3);
        let items = vec![
            example(1000, 2, true),
            example(1000, 2, true),
            example(950, 2, true),
            example(1000, 2, true),
        ];
        let batch = collate_to_shortest(&items, &mut rng).expect("collate");
        assert_eq!(batch.tokens.dims(), [4, 950]);
        assert_eq!(batch.audio.dims(), [4, 950, 2]);
        assert_eq!(batch.mask.expect("mask").dims(), [4, 950]);
    }

    #[test]
    fn no_value_in_batch_equals_pad_sentinel() {
        let mut rng = StdRng::seed_from_u64(5);
        let items = vec![example(30, 1, false), example(20, 1, false)];
        let batch = collate_to_shortest(&items, &mut rng).expect("collate");
        let audio = batch.audio.flatten_all().expect("flatten");
        for value in audio.to_vec1::<f32>().expect("to_vec1") {
            assert_ne!(value, PAD_SENTINEL);
            assert!(value >= 1.0, "zero-padding leaked into the batch");
        }
        assert!(batch.mask.is_none());
    }

    #[test]
    fn windows_keep_tokens_and_audio_in_sync() {
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..50 {
            let items = vec![example(60, 1, false), example(25, 1, false)];
            let batch = collate_to_shortest(&items, &mut rng).expect("collate");
            let tokens = batch.tokens.to_vec2::<u32>().expect("tokens");
            let audio = batch.audio.to_vec3::<f32>().expect("audio");
            for (row_tokens, row_audio) in tokens.iter().zip(&audio) {
                for (token, frame) in row_tokens.iter().zip(row_audio) {
                    assert_eq!(*token as f32, frame[0]);
                }
            }
        }
    }

    #[test]
    fn empty_batch_fails() {
        let mut rng = StdRng::seed_from_u64(9);
        let items: Vec<Example> = Vec::new();
        assert!(collate_to_shortest(&items, &mut rng).is_err());
    }

    #[test]
    fn mixed_mask_presence_fails() {
        let mut rng = StdRng::seed_from_u64(10);
        let items = vec![example(10, 1, true), example(10, 1, false)];
        assert!(collate_to_shortest(&items, &mut rng).is_err());
    }

    #[test]
    fn duration_examples_collate_pairwise() {
        let mut rng = StdRng::seed_from_u64(12);
        let make = |n: usize| {
            let tokens: Vec<u32> = (0..n as u32).collect();
            let durations: Vec<u32> = (0..n as u32).map(|v| v * 10).collect();
            DurationExample {
                tokens: Tensor::from_vec(tokens, n, &Device::Cpu).expect("tokens"),
                durations: Tensor::from_vec(durations, n, &Device::Cpu).expect("durations"),
            }
        };
        let batch = collate_to_shortest(&[make(8), make(5), make(6)], &mut rng).expect("collate");
        assert_eq!(batch.tokens.dims(), [3, 5]);
        assert_eq!(batch.durations.dims(), [3, 5]);
        let tokens = batch.tokens.to_vec2::<u32>().expect("tokens");
        let durations = batch.durations.to_vec2::<u32>().expect("durations");
        for (row_tokens, row_durations) in tokens.iter().zip(&durations) {
            for (token, duration) in row_tokens.iter().zip(row_durations) {
                assert_eq!(token * 10, *duration);
            }
        }
    }
}
