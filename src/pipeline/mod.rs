pub mod collate;
pub mod crop;
pub mod loader;
pub mod mask;
pub mod tokenizer;
pub mod traits;
