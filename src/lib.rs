pub mod alignment;
pub mod config;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod sources;
pub mod types;

pub use config::{DataConfig, MaskConfig};
pub use error::DatasetError;
pub use manifest::ManifestEntry;
pub use pipeline::collate::{collate_to_shortest, BatchItem};
pub use pipeline::loader::BatchLoader;
pub use pipeline::mask::MaskPolicy;
pub use pipeline::tokenizer::VocabTokenizer;
pub use pipeline::traits::{ExampleSource, PhonemeTokenizer};
pub use sources::{AlignedSource, FlatSource, PhoneRecordSource};
pub use types::{AlignmentInterval, Batch, DurationBatch, DurationExample, Example};
