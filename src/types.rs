use candle_core::Tensor;

/// One labeled span of an utterance's phoneme alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentInterval {
    pub start_time: f64,
    /// End times are non-decreasing across an utterance's interval list.
    pub end_time: f64,
    /// `None` (stored as empty text in the alignment file) marks silence.
    pub label: Option<String>,
}

/// One training instance: frame-level token ids paired with audio features.
///
/// All component tensors share the same leading length `L`; the mask, when
/// present, uses 1 for visible frames and 0 for hidden frames.
#[derive(Debug, Clone)]
pub struct Example {
    /// Token ids, shape `[L]`, u32.
    pub tokens: Tensor,
    /// Time-major audio features, shape `[L, C]`, f32.
    pub audio: Tensor,
    /// Visibility mask, shape `[L]`, u8.
    pub mask: Option<Tensor>,
}

/// A token sequence paired with per-token frame durations. Unlike
/// [`Example`], the durations are a prediction target, not a crop length.
#[derive(Debug, Clone)]
pub struct DurationExample {
    /// Token ids, shape `[N]`, u32.
    pub tokens: Tensor,
    /// Frames per token, shape `[N]`, u32. Zero-duration entries mark word
    /// boundaries with no audible gap.
    pub durations: Tensor,
}

/// Stacked examples cropped to the shortest sequence length in the batch.
#[derive(Debug, Clone)]
pub struct Batch {
    /// `[B, L]` u32.
    pub tokens: Tensor,
    /// `[B, L, C]` f32.
    pub audio: Tensor,
    /// `[B, L]` u8, present iff every collated example carried a mask.
    pub mask: Option<Tensor>,
}

#[derive(Debug, Clone)]
pub struct DurationBatch {
    /// `[B, L]` u32.
    pub tokens: Tensor,
    /// `[B, L]` u32.
    pub durations: Tensor,
}
