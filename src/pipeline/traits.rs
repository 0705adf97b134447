use candle_core::{Device, Tensor};
use rand::RngCore;

use crate::error::DatasetError;

/// Maps phoneme symbols to integer token ids.
///
/// Implementations expose the reserved silence and unknown symbols so the
/// alignment decoder can resolve unlabeled and unintelligible spans, and the
/// vocabulary size so the (external) model can size its embedding table.
pub trait PhonemeTokenizer: Send + Sync {
    /// Encode symbols to a u32 tensor of shape `[N]` on `device`.
    fn encode(&self, symbols: &[String], device: &Device) -> Result<Tensor, DatasetError>;

    fn silence_symbol(&self) -> &str;

    fn unknown_symbol(&self) -> &str;

    fn n_tokens(&self) -> usize;
}

/// A finite, index-addressable producer of training items.
///
/// Access is idempotent apart from randomized choices (crop offsets, mask
/// spans), which are drawn fresh from `rng` on every call. Items are built
/// lazily per access; the source keeps no ownership of returned items.
pub trait ExampleSource: Send + Sync {
    type Item;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize, rng: &mut dyn RngCore) -> Result<Self::Item, DatasetError>;
}
