//! Regex-segmented byte-pair engine backing the Tekken tokenizer.
//!
//! Text is split into pieces with the configured pattern and every piece is
//! merged independently with [`byte_pair_encode`]. The engine works in rank
//! space `[0, n_ranks)`; shifting ranks past the reserved control-token ids is
//! the caller's job.

use fancy_regex::Regex;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use super::bpe::byte_pair_encode;
use super::tokenizer::TokenizerError;
use super::vocab::{build_decoder, load_tiktoken_bpe};

/// Byte-level BPE over regex pieces, tiktoken style.
#[derive(Debug)]
pub struct TiktokenBpe {
    encoder: FxHashMap<Vec<u8>, u32>,
    decoder: FxHashMap<u32, Vec<u8>>,
    regex: Regex,
}

impl TiktokenBpe {
    /// Build the engine from an already decoded rank table.
    ///
    /// # Arguments
    /// * `encoder` - Map of byte sequences to ranks
    /// * `pattern` - Segmentation pattern (may use look-around)
    pub fn new(encoder: FxHashMap<Vec<u8>, u32>, pattern: &str) -> Result<Self, TokenizerError> {
        let regex = Regex::new(pattern)?;
        debug!(ranks = encoder.len(), pattern, "byte-pair engine initialized");
        Ok(Self::with_regex(encoder, regex))
    }

    fn with_regex(encoder: FxHashMap<Vec<u8>, u32>, regex: Regex) -> Self {
        let decoder = build_decoder(&encoder);
        Self {
            encoder,
            decoder,
            regex,
        }
    }

    /// Build the engine from a rank table in plain or compressed tiktoken format.
    pub fn from_bytes(data: &[u8], pattern: &str) -> Result<Self, TokenizerError> {
        let encoder = load_tiktoken_bpe(data)?;
        Self::new(encoder, pattern)
    }

    /// Encode text to ranks.
    ///
    /// If the pattern fails at runtime (backtrack limit), segmentation stops and
    /// the rest of the text is merged as a single piece.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        let mut ranks = Vec::with_capacity(text.len() / 3 + 1);
        let mut last_end = 0;

        for m in self.regex.find_iter(text) {
            match m {
                Ok(m) => {
                    ranks.extend(byte_pair_encode(m.as_str().as_bytes(), &self.encoder));
                    last_end = m.end();
                }
                Err(err) => {
                    let tail = &text.as_bytes()[last_end..];
                    warn!(
                        error = %err,
                        offset = last_end,
                        len = tail.len(),
                        "segmentation pattern failed; merging remaining text unsplit"
                    );
                    ranks.extend(byte_pair_encode(tail, &self.encoder));
                    break;
                }
            }
        }

        ranks
    }

    /// Decode ranks back to bytes. Unknown ranks are skipped.
    pub fn decode_bytes(&self, ranks: &[u32]) -> Vec<u8> {
        let mut result = Vec::with_capacity(ranks.len() * 4);
        for rank in ranks {
            if let Some(bytes) = self.decoder.get(rank) {
                result.extend_from_slice(bytes);
            }
        }
        result
    }

    /// Decode ranks to a string, replacing invalid UTF-8 with U+FFFD.
    pub fn decode_lossy(&self, ranks: &[u32]) -> String {
        String::from_utf8_lossy(&self.decode_bytes(ranks)).into_owned()
    }

    /// Number of ranks in the table.
    pub fn n_ranks(&self) -> usize {
        self.encoder.len()
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_engine() -> TiktokenBpe {
        let mut encoder = FxHashMap::default();
        for b in 32u8..=126 {
            encoder.insert(vec![b], b as u32);
        }
        encoder.insert(b"He".to_vec(), 200);
        encoder.insert(b"ll".to_vec(), 201);
        encoder.insert(b"Hell".to_vec(), 202);
        encoder.insert(b"Hello".to_vec(), 203);
        encoder.insert(b" W".to_vec(), 204);

        TiktokenBpe::new(encoder, r"\S+|\s+(?!\S)|\s+").unwrap()
    }

    #[test]
    fn test_encode_decode() {
        let engine = make_engine();
        let ranks = engine.encode("Hello World");
        // "Hello" is a whole-piece hit; " " and "World" are separate pieces.
        assert_eq!(ranks[0], 203);
        assert_eq!(engine.decode_lossy(&ranks), "Hello World");
    }

    #[test]
    fn test_pieces_do_not_merge_across_boundaries() {
        let engine = make_engine();
        // " W" has a rank, but the pattern puts the space and "W" in different pieces.
        assert_eq!(engine.encode(" W"), vec![32, 87]);
    }

    #[test]
    fn test_merges_inside_piece() {
        let engine = make_engine();
        assert_eq!(engine.encode("Hellx"), vec![202, b'x' as u32]);
    }

    #[test]
    fn test_decode_skips_unknown_ranks() {
        let engine = make_engine();
        assert_eq!(engine.decode_lossy(&[203, 9999, 33]), "Hello!");
    }

    #[test]
    fn test_empty_text() {
        let engine = make_engine();
        assert!(engine.encode("").is_empty());
    }

    #[test]
    fn test_from_compressed_table() {
        // "! 0 <a> <b> <ab>"
        let engine = TiktokenBpe::from_bytes(b"! 0 YQ== Yg== YWI=\n", r"\S+").unwrap();
        assert_eq!(engine.n_ranks(), 3);
        assert_eq!(engine.encode("abba"), vec![2, 1, 0]);
    }

    #[test]
    fn test_pattern_failure_keeps_remaining_text() {
        let mut engine = make_engine();
        // With no backtracking allowed the look-ahead branch fails at runtime.
        engine.regex = fancy_regex::RegexBuilder::new(r"\S+|\s+(?!\S)|\s+")
            .backtrack_limit(0)
            .build()
            .unwrap();

        let text = "Hello   World  !";
        let ranks = engine.encode(text);
        assert_eq!(ranks[0], 203);
        assert_eq!(engine.decode_lossy(&ranks), text);
    }

    #[test]
    fn test_bad_pattern_is_configuration_error() {
        let err = TiktokenBpe::new(FxHashMap::default(), r"(unclosed").unwrap_err();
        assert!(err.is_configuration_error());
    }
}
