use std::collections::HashMap;
use std::path::Path;

use candle_core::{Device, Tensor};

use crate::error::DatasetError;
use crate::pipeline::traits::PhonemeTokenizer;

/// Vocabulary-backed tokenizer. Symbols missing from the vocabulary encode
/// to the unknown id rather than failing, so out-of-inventory phones from a
/// foreign aligner degrade instead of halting training.
pub struct VocabTokenizer {
    vocab: HashMap<String, u32>,
    silence: String,
    unknown: String,
    unknown_id: u32,
}

impl VocabTokenizer {
    pub const DEFAULT_SILENCE: &'static str = "<SIL>";
    pub const DEFAULT_UNKNOWN: &'static str = "<UNK>";

    pub fn new(
        vocab: HashMap<String, u32>,
        silence: impl Into<String>,
        unknown: impl Into<String>,
    ) -> Result<Self, DatasetError> {
        let silence = silence.into();
        let unknown = unknown.into();
        if !vocab.contains_key(&silence) {
            return Err(DatasetError::invalid_input(format!(
                "vocabulary has no silence symbol '{silence}'"
            )));
        }
        let unknown_id = *vocab.get(&unknown).ok_or_else(|| {
            DatasetError::invalid_input(format!("vocabulary has no unknown symbol '{unknown}'"))
        })?;
        Ok(Self {
            vocab,
            silence,
            unknown,
            unknown_id,
        })
    }

    /// Load a JSON `{"symbol": id}` vocabulary. The file must define
    /// [`Self::DEFAULT_SILENCE`] and [`Self::DEFAULT_UNKNOWN`].
    pub fn from_file(path: &Path) -> Result<Self, DatasetError> {
        let data =
            std::fs::read_to_string(path).map_err(|e| DatasetError::io("read vocab.json", e))?;
        let vocab: HashMap<String, u32> =
            serde_json::from_str(&data).map_err(|e| DatasetError::json("parse vocab.json", e))?;
        Self::new(vocab, Self::DEFAULT_SILENCE, Self::DEFAULT_UNKNOWN)
    }
}

impl PhonemeTokenizer for VocabTokenizer {
    fn encode(&self, symbols: &[String], device: &Device) -> Result<Tensor, DatasetError> {
        let ids: Vec<u32> = symbols
            .iter()
            .map(|symbol| self.vocab.get(symbol).copied().unwrap_or(self.unknown_id))
            .collect();
        Tensor::from_vec(ids, symbols.len(), device)
            .map_err(|e| DatasetError::runtime("build token tensor", e))
    }

    fn silence_symbol(&self) -> &str {
        &self.silence
    }

    fn unknown_symbol(&self) -> &str {
        &self.unknown
    }

    fn n_tokens(&self) -> usize {
        self.vocab.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn test_vocab() -> HashMap<String, u32> {
        let mut vocab = HashMap::new();
        vocab.insert(VocabTokenizer::DEFAULT_SILENCE.to_string(), 0);
        vocab.insert(VocabTokenizer::DEFAULT_UNKNOWN.to_string(), 1);
        vocab.insert("a".to_string(), 2);
        vocab.insert("b".to_string(), 3);
        vocab
    }

    #[test]
    fn encodes_known_symbols() {
        let tokenizer = VocabTokenizer::new(
            test_vocab(),
            VocabTokenizer::DEFAULT_SILENCE,
            VocabTokenizer::DEFAULT_UNKNOWN,
        )
        .expect("tokenizer");
        let symbols = vec!["a".to_string(), "<SIL>".to_string(), "b".to_string()];
        let ids = tokenizer.encode(&symbols, &Device::Cpu).expect("encode");
        assert_eq!(ids.to_vec1::<u32>().expect("to_vec1"), [2, 0, 3]);
        assert_eq!(tokenizer.n_tokens(), 4);
    }

    #[test]
    fn unseen_symbol_encodes_to_unknown() {
        let tokenizer = VocabTokenizer::new(
            test_vocab(),
            VocabTokenizer::DEFAULT_SILENCE,
            VocabTokenizer::DEFAULT_UNKNOWN,
        )
        .expect("tokenizer");
        let symbols = vec!["zz".to_string()];
        let ids = tokenizer.encode(&symbols, &Device::Cpu).expect("encode");
        assert_eq!(ids.to_vec1::<u32>().expect("to_vec1"), [1]);
    }

    #[test]
    fn missing_reserved_symbols_fail() {
        let mut vocab = HashMap::new();
        vocab.insert("a".to_string(), 0);
        assert!(VocabTokenizer::new(vocab, "<SIL>", "<UNK>").is_err());
    }

    #[test]
    fn loads_vocab_from_json() {
        let path = std::env::temp_dir().join("phoneme_data_rs_vocab.json");
        std::fs::write(&path, r#"{"<SIL>": 0, "<UNK>": 1, "a": 2}"#).expect("write vocab");
        let tokenizer = VocabTokenizer::from_file(&path).expect("tokenizer");
        assert_eq!(tokenizer.n_tokens(), 3);
        assert_eq!(tokenizer.silence_symbol(), "<SIL>");
        let _ = std::fs::remove_file(&path);
    }
}
