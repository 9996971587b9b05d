//! Asset payload codecs.
//!
//! Two families of tables are decoded here:
//!
//! - The SentencePiece-BPE assets (`vocab.bin`, `merges.bin`) used by the
//!   v1/v2/v3 SentencePiece tokenizers. Both are base64 text.
//! - The tiktoken rank table embedded in the Tekken JSON document.
//!
//! # SentencePiece payloads
//!
//! The vocabulary payload decodes to UTF-8 text with one token per line; the
//! line index is the token id.
//!
//! The merge payload decodes to a flat array of little-endian `u16` ids. Every
//! two ids form a `(left, right)` pair, and the pair at 0-based position `k`
//! has rank `k + 1`:
//!
//! ```text
//! [l0 lo][l0 hi][r0 lo][r0 hi][l1 lo][l1 hi][r1 lo][r1 hi] ...
//!  \_______ rank 1 ________/   \_______ rank 2 ________/
//! ```
//!
//! # Tiktoken rank tables
//!
//! Both the plain format (`<base64> <rank>` per line) and the compressed
//! format emitted by the Tekken export script are accepted:
//!
//! ```text
//! ! 0 AA== AQ== Ag==
//! ! 3 aGk=
//! ```
//!
//! On a compressed line the `i`-th token has rank `offset + i`.

use base64::{engine::general_purpose::STANDARD, Engine};
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Errors that can occur when decoding asset payloads.
#[derive(Error, Debug)]
pub enum VocabError {
    #[error("Invalid base64 encoding: {0}")]
    Base64Error(#[from] base64::DecodeError),
    #[error("Vocabulary payload is not valid UTF-8")]
    Utf8Error,
    #[error("Merge payload length {0} is not a multiple of 4 bytes")]
    TruncatedMerges(usize),
    #[error("Merge #{rank} references token id {id}, but the vocabulary has {vocab_size} entries")]
    MergeIdOutOfRange { rank: u32, id: u32, vocab_size: usize },
    #[error("Invalid line format: {0}")]
    ParseError(String),
}

/// Decode a base64 payload, ignoring ASCII whitespace (line breaks, trailing newline).
pub fn decode_base64(payload: &[u8]) -> Result<Vec<u8>, VocabError> {
    let compact: Vec<u8> = payload
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    Ok(STANDARD.decode(compact)?)
}

/// Decode the SentencePiece vocabulary payload into an id-indexed token array.
///
/// Every `\n`-separated line is a token, including a trailing empty line if the
/// decoded text ends with a newline.
pub fn decode_vocabulary(payload: &[u8]) -> Result<Vec<String>, VocabError> {
    let bytes = decode_base64(payload)?;
    let text = String::from_utf8(bytes).map_err(|_| VocabError::Utf8Error)?;
    Ok(text.split('\n').map(str::to_owned).collect())
}

/// Build the string → id index for a vocabulary.
///
/// When a string occurs more than once, the highest id wins.
pub fn build_index(vocab: &[String]) -> FxHashMap<String, u32> {
    vocab
        .iter()
        .enumerate()
        .map(|(id, token)| (token.clone(), id as u32))
        .collect()
}

/// Merge ranks keyed by the ordered pair of token strings.
///
/// Pairs are stored by the canonical id of each string (the id the vocabulary
/// index resolves the string to), so looking up two canonical ids is the same
/// as looking up the joined strings.
#[derive(Debug, Clone, Default)]
pub struct MergeTable {
    ranks: FxHashMap<(u32, u32), u32>,
}

impl MergeTable {
    /// Rank of merging `left` followed by `right`, if that merge exists.
    #[inline]
    pub fn rank(&self, left: u32, right: u32) -> Option<u32> {
        self.ranks.get(&(left, right)).copied()
    }

    /// Number of distinct mergeable pairs.
    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

/// Decode the SentencePiece merge payload against an already-decoded vocabulary.
///
/// A pair listed twice keeps the rank of its later occurrence.
pub fn decompress_merges(
    payload: &[u8],
    vocab: &[String],
    index: &FxHashMap<String, u32>,
) -> Result<MergeTable, VocabError> {
    let bytes = decode_base64(payload)?;
    if bytes.len() % 4 != 0 {
        return Err(VocabError::TruncatedMerges(bytes.len()));
    }

    let mut ranks = FxHashMap::default();
    ranks.reserve(bytes.len() / 4);

    for (position, pair) in bytes.chunks_exact(4).enumerate() {
        let rank = position as u32 + 1;
        let left = u16::from_le_bytes([pair[0], pair[1]]) as u32;
        let right = u16::from_le_bytes([pair[2], pair[3]]) as u32;

        let canonical = |id: u32| -> Result<u32, VocabError> {
            vocab
                .get(id as usize)
                .and_then(|token| index.get(token))
                .copied()
                .ok_or(VocabError::MergeIdOutOfRange {
                    rank,
                    id,
                    vocab_size: vocab.len(),
                })
        };

        ranks.insert((canonical(left)?, canonical(right)?), rank);
    }

    Ok(MergeTable { ranks })
}

/// Load a tiktoken BPE rank table from raw bytes.
///
/// Accepts the plain `base64_token rank` format and the compressed
/// `! offset token token ...` format. Blank lines are skipped.
pub fn load_tiktoken_bpe(data: &[u8]) -> Result<FxHashMap<Vec<u8>, u32>, VocabError> {
    let mut encoder = FxHashMap::default();

    for line in data.split(|&b| b == b'\n') {
        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix(b"! ") {
            let mut fields = rest
                .split(|&b| b == b' ')
                .filter(|field| !field.is_empty());
            let offset = fields
                .next()
                .ok_or_else(|| VocabError::ParseError("Missing rank offset".to_string()))
                .and_then(parse_rank)?;

            for (i, token_b64) in fields.enumerate() {
                encoder.insert(STANDARD.decode(token_b64)?, offset + i as u32);
            }
            continue;
        }

        // Find the space separator
        let space_pos = line
            .iter()
            .rposition(|&b| b == b' ')
            .ok_or_else(|| VocabError::ParseError("Missing space separator".to_string()))?;

        let token = STANDARD.decode(&line[..space_pos])?;
        let rank = parse_rank(&line[space_pos + 1..])?;

        encoder.insert(token, rank);
    }

    Ok(encoder)
}

fn parse_rank(field: &[u8]) -> Result<u32, VocabError> {
    let rank_str = std::str::from_utf8(field)
        .map_err(|_| VocabError::ParseError("Invalid UTF-8 in rank".to_string()))?;
    rank_str
        .trim()
        .parse()
        .map_err(|_| VocabError::ParseError(format!("Invalid rank: {}", rank_str)))
}

/// Build a decoder map (rank → bytes) from an encoder map (bytes → rank).
pub fn build_decoder(encoder: &FxHashMap<Vec<u8>, u32>) -> FxHashMap<u32, Vec<u8>> {
    encoder.iter().map(|(k, v)| (*v, k.clone())).collect()
}
