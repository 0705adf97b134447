use std::path::Path;

use candle_core::{Device, Tensor};

use crate::error::DatasetError;

pub mod aligned;
pub mod flat;
pub mod records;

pub use aligned::AlignedSource;
pub use flat::FlatSource;
pub use records::PhoneRecordSource;

/// Preferred tensor name inside a feature safetensors file.
const FEATURES_KEY: &str = "features";

/// Load a `[C, T]` feature safetensors file and transpose it time-major.
///
/// The file either names its tensor `features` or contains exactly one
/// tensor; anything else is ambiguous and rejected.
pub(crate) fn load_features(path: &Path, device: &Device) -> Result<Tensor, DatasetError> {
    let tensors = candle_core::safetensors::load(path, device)
        .map_err(|e| DatasetError::runtime("load feature safetensors", e))?;

    let named = tensors.get(FEATURES_KEY).cloned();
    let tensor = match named {
        Some(tensor) => tensor,
        None if tensors.len() == 1 => match tensors.into_iter().next() {
            Some((_, tensor)) => tensor,
            None => unreachable!("len() == 1 guarantees one entry"),
        },
        None => {
            return Err(DatasetError::invalid_input(format!(
                "'{}': expected a '{FEATURES_KEY}' tensor or a single entry, found {} tensors",
                path.display(),
                tensors.len()
            )))
        }
    };

    let (_channels, _frames) = tensor
        .dims2()
        .map_err(|e| DatasetError::runtime("feature tensor shape", e))?;
    tensor
        .transpose(0, 1)
        .map_err(|e| DatasetError::runtime("transpose features", e))
}
