//! SentencePiece-BPE tokenizer (Mistral v1/v2/v3 32k vocabularies).
//!
//! Encoding starts from one token per Unicode scalar value and then greedily
//! applies the lowest-ranked legal adjacent merge until none remain. The merge
//! loop runs over an index-addressed token chain with a min-heap of merge
//! candidates:
//!
//! - A candidate's priority is `rank + position / n`, where `position` is the
//!   left node's index in the initial sequence and `n` the initial length. The
//!   fraction orders equal-rank merges left to right and is always `< 1`, so
//!   it never reorders different ranks.
//! - Entries are invalidated lazily. Merging `left`/`right` tombstones both,
//!   and also tombstones `left`'s predecessor, replacing it with a fresh copy
//!   in the chain, so any queued candidate naming the old predecessor is
//!   discarded on pop.
//!
//! Characters missing from the vocabulary fall back to `<0xNN>` byte tokens.

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use super::heap::{MinHeap, Prioritized};
use super::special::{BOS, EOS, UNK};
use super::tokenizer::{Tokenizer, TokenizerError};
use super::vocab::{build_index, decode_vocabulary, decompress_merges, MergeTable};

/// Marker that stands in for every space, plus the artificial leading one.
pub const SPACE_MARKER: char = '\u{2581}';

/// Vocabulary name of the byte-fallback token for `byte`, e.g. `<0x0A>`.
pub fn byte_token(byte: u8) -> String {
    format!("<0x{:02X}>", byte)
}

/// Inverse of [`byte_token`]. Returns `None` for anything that is not a byte token.
pub fn parse_byte_token(token: &str) -> Option<u8> {
    let hex = token.strip_prefix("<0x")?.strip_suffix('>')?;
    if hex.len() != 2 {
        return None;
    }
    u8::from_str_radix(hex, 16).ok()
}

/// Greedy-merge SentencePiece BPE tokenizer.
#[derive(Debug)]
pub struct SentencePieceBpe {
    vocab: Vec<String>,
    index: FxHashMap<String, u32>,
    merges: MergeTable,
    byte_fallback: [Option<u32>; 256],
    bos_id: u32,
    eos_id: u32,
    unk_id: u32,
}

impl SentencePieceBpe {
    /// Build the tokenizer from the base64 `vocab.bin` and `merges.bin` payloads.
    pub fn from_payloads(vocab_payload: &[u8], merges_payload: &[u8]) -> Result<Self, TokenizerError> {
        let vocab = decode_vocabulary(vocab_payload)?;
        let index = build_index(&vocab);
        let merges = decompress_merges(merges_payload, &vocab, &index)?;

        let lookup = |name: &str| {
            index
                .get(name)
                .copied()
                .ok_or_else(|| TokenizerError::MissingSpecialToken(name.to_string()))
        };
        let bos_id = lookup(BOS)?;
        let eos_id = lookup(EOS)?;
        let unk_id = lookup(UNK)?;

        let mut byte_fallback = [None; 256];
        for (byte, slot) in byte_fallback.iter_mut().enumerate() {
            *slot = index.get(&byte_token(byte as u8)).copied();
        }
        let missing_bytes = byte_fallback.iter().filter(|slot| slot.is_none()).count();

        debug!(
            vocab_size = vocab.len(),
            merge_count = merges.len(),
            missing_bytes,
            "SentencePiece tokenizer initialized"
        );

        Ok(Self {
            vocab,
            index,
            merges,
            byte_fallback,
            bos_id,
            eos_id,
            unk_id,
        })
    }

    /// Id of the `<unk>` token substituted when even byte fallback fails.
    pub fn unk_id(&self) -> u32 {
        self.unk_id
    }

    /// Look up the id of an exact token string.
    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.index.get(token).copied()
    }

    /// Look up the string of a token id.
    pub fn id_to_token(&self, id: u32) -> Option<&str> {
        self.vocab.get(id as usize).map(String::as_str)
    }

    /// Map every character of `text` (with the leading marker added and spaces
    /// replaced) to a token id, falling back to byte tokens.
    fn map_characters(&self, text: &str) -> Vec<u32> {
        let mut ids = Vec::with_capacity(text.len() + 1);
        let mut buf = [0u8; 4];

        let chars = std::iter::once(SPACE_MARKER)
            .chain(text.chars().map(|c| if c == ' ' { SPACE_MARKER } else { c }));

        for c in chars {
            if let Some(&id) = self.index.get(c.encode_utf8(&mut buf) as &str) {
                ids.push(id);
                continue;
            }

            for &byte in c.encode_utf8(&mut buf).as_bytes() {
                match self.byte_fallback[byte as usize] {
                    Some(id) => ids.push(id),
                    None => {
                        warn!(
                            character = %c,
                            byte,
                            token = %byte_token(byte),
                            "no byte-fallback token for character; substituting <unk>"
                        );
                        if let Some(last) = ids.last_mut() {
                            *last = self.unk_id;
                        }
                    }
                }
            }
        }

        ids
    }

    fn push_candidate(&self, chain: &TokenChain, left: usize, queue: &mut MinHeap<MergeCandidate>) {
        let Some(right) = chain.next[left] else {
            return;
        };
        let Some(rank) = self.merges.rank(chain.token_ids[left], chain.token_ids[right]) else {
            return;
        };
        let priority = rank as f64 + chain.positions[left] as f64 / chain.initial_len as f64;
        queue.push(MergeCandidate {
            left,
            right,
            priority,
        });
    }

    /// Run the greedy merge loop over an initial id sequence.
    fn merge(&self, ids: &[u32]) -> Vec<u32> {
        let mut chain = TokenChain::new(ids);
        let mut queue = MinHeap::with_capacity(ids.len());

        for left in 0..ids.len().saturating_sub(1) {
            self.push_candidate(&chain, left, &mut queue);
        }

        while let Some(candidate) = queue.pop() {
            let left = candidate.left;
            let right = candidate.right;

            if chain.deleted[left] || chain.deleted[right] || chain.next[left] != Some(right) {
                continue;
            }

            chain.deleted[left] = true;
            chain.deleted[right] = true;

            let mut prev = chain.prev[left];
            if let Some(old_prev) = prev {
                chain.deleted[old_prev] = true;
                let copy = chain.push(
                    chain.positions[old_prev],
                    chain.token_ids[old_prev],
                    chain.prev[old_prev],
                    Some(left),
                );
                chain.prev[left] = Some(copy);
                chain.relink_before(copy);
                prev = Some(copy);
            }

            let merged_token = format!(
                "{}{}",
                self.vocab[chain.token_ids[left] as usize],
                self.vocab[chain.token_ids[right] as usize]
            );
            let Some(&merged_id) = self.index.get(&merged_token) else {
                warn!(
                    token = %merged_token,
                    "merge rank exists but merged token is not in the vocabulary; skipping merge"
                );
                continue;
            };

            let next = chain.next[right];
            let merged = chain.push(chain.positions[left], merged_id, prev, next);
            chain.relink_before(merged);
            if let Some(p) = prev {
                self.push_candidate(&chain, p, &mut queue);
            }
            if let Some(n) = next {
                chain.prev[n] = Some(merged);
                self.push_candidate(&chain, merged, &mut queue);
            }
        }

        chain.collect()
    }
}

impl Tokenizer for SentencePieceBpe {
    fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    fn vocab(&self) -> &[String] {
        &self.vocab
    }

    fn bos_id(&self) -> u32 {
        self.bos_id
    }

    fn eos_id(&self) -> u32 {
        self.eos_id
    }

    /// Encode `text`. An empty string always encodes to no tokens, whatever
    /// the BOS/EOS flags say.
    fn encode(&self, text: &str, add_bos: bool, add_eos: bool) -> Vec<u32> {
        if text.is_empty() {
            return Vec::new();
        }

        let characters = self.map_characters(text);
        let mut ids = Vec::with_capacity(characters.len() + 2);
        if add_bos {
            ids.push(self.bos_id);
        }
        ids.extend(characters);
        if add_eos {
            ids.push(self.eos_id);
        }

        self.merge(&ids)
    }

    /// Decode ids to text. A single leading BOS is skipped, then the leading
    /// space marker added by [`encode`](Tokenizer::encode) is dropped.
    fn decode(&self, ids: &[u32]) -> Result<String, TokenizerError> {
        let ids = match ids.first() {
            Some(&first) if first == self.bos_id => &ids[1..],
            _ => ids,
        };

        let mut bytes = Vec::with_capacity(ids.len() * 4);
        for &id in ids {
            let token = self
                .vocab
                .get(id as usize)
                .ok_or(TokenizerError::InvalidTokenId(id, self.vocab.len()))?;
            match parse_byte_token(token) {
                Some(byte) => bytes.push(byte),
                None => bytes.extend_from_slice(token.as_bytes()),
            }
        }

        let text = String::from_utf8_lossy(&bytes).replace(SPACE_MARKER, " ");
        let mut chars = text.chars();
        chars.next();
        Ok(chars.as_str().to_string())
    }
}

/// A pending merge of `left` with the node that followed it when queued.
struct MergeCandidate {
    left: usize,
    right: usize,
    priority: f64,
}

impl Prioritized for MergeCandidate {
    #[inline]
    fn priority(&self) -> f64 {
        self.priority
    }
}

/// Doubly linked token list stored as parallel arrays indexed by node.
///
/// Nodes are only ever appended; removal is a tombstone bit. Traversal from
/// `head` follows `next` links regardless of tombstones.
struct TokenChain {
    token_ids: Vec<u32>,
    positions: Vec<usize>,
    prev: Vec<Option<usize>>,
    next: Vec<Option<usize>>,
    deleted: Vec<bool>,
    head: usize,
    initial_len: usize,
}

impl TokenChain {
    fn new(ids: &[u32]) -> Self {
        let n = ids.len();
        // Every merge appends at most two nodes.
        let capacity = n * 3;
        let mut chain = Self {
            token_ids: Vec::with_capacity(capacity),
            positions: Vec::with_capacity(capacity),
            prev: Vec::with_capacity(capacity),
            next: Vec::with_capacity(capacity),
            deleted: Vec::with_capacity(capacity),
            head: 0,
            initial_len: n,
        };
        for (i, &id) in ids.iter().enumerate() {
            let prev = i.checked_sub(1);
            let next = if i + 1 < n { Some(i + 1) } else { None };
            chain.push(i, id, prev, next);
        }
        chain
    }

    fn push(&mut self, position: usize, token_id: u32, prev: Option<usize>, next: Option<usize>) -> usize {
        let node = self.token_ids.len();
        self.token_ids.push(token_id);
        self.positions.push(position);
        self.prev.push(prev);
        self.next.push(next);
        self.deleted.push(false);
        node
    }

    /// Point `node`'s predecessor (or the head) at `node`.
    fn relink_before(&mut self, node: usize) {
        match self.prev[node] {
            Some(p) => self.next[p] = Some(node),
            None => self.head = node,
        }
    }

    fn collect(&self) -> Vec<u32> {
        let mut ids = Vec::with_capacity(self.initial_len);
        if self.initial_len == 0 {
            return ids;
        }
        let mut cursor = Some(self.head);
        while let Some(node) = cursor {
            ids.push(self.token_ids[node]);
            cursor = self.next[node];
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine};

    fn tokenizer(tokens: &[&str], merges: &[(u16, u16)]) -> SentencePieceBpe {
        let vocab = STANDARD.encode(tokens.join("\n"));
        let mut bytes = Vec::new();
        for &(l, r) in merges {
            bytes.extend_from_slice(&l.to_le_bytes());
            bytes.extend_from_slice(&r.to_le_bytes());
        }
        let merges = STANDARD.encode(bytes);
        SentencePieceBpe::from_payloads(vocab.as_bytes(), merges.as_bytes()).unwrap()
    }

    #[test]
    fn test_byte_token_names() {
        assert_eq!(byte_token(0x0A), "<0x0A>");
        assert_eq!(byte_token(0xF0), "<0xF0>");
        assert_eq!(parse_byte_token("<0x0A>"), Some(0x0A));
        assert_eq!(parse_byte_token("<0xff>"), Some(0xFF));
        assert_eq!(parse_byte_token("<0x1>"), None);
        assert_eq!(parse_byte_token("<s>"), None);
        assert_eq!(parse_byte_token("0x0A"), None);
    }

    #[test]
    fn test_missing_byte_token_substitutes_unk() {
        // No byte tokens at all: "€" has nothing to fall back to.
        let tok = tokenizer(&["<unk>", "<s>", "</s>", "▁", "a"], &[]);
        assert_eq!(tok.encode("a€", true, false), vec![1, 3, 0]);
    }

    #[test]
    fn test_missing_bos_is_a_configuration_error() {
        let vocab = STANDARD.encode("<unk>\n</s>\n▁");
        let err = SentencePieceBpe::from_payloads(vocab.as_bytes(), b"").unwrap_err();
        assert!(matches!(err, TokenizerError::MissingSpecialToken(ref name) if name == "<s>"));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_merge_with_unknown_product_is_abandoned() {
        // "a"+"b" has a rank but "ab" is not in the vocabulary.
        let tok = tokenizer(&["<unk>", "<s>", "</s>", "▁", "a", "b"], &[(4, 5)]);
        assert_eq!(tok.encode("ab", false, false), vec![3, 4, 5]);
    }

    #[test]
    fn test_equal_rank_merges_resolve_left_to_right() {
        // "###" can merge as "##" + "#" or "#" + "##"; left-most wins.
        let tok = tokenizer(&["<unk>", "<s>", "</s>", "▁", "#", "##"], &[(4, 4)]);
        assert_eq!(tok.encode("###", true, false), vec![1, 3, 5, 4]);
    }

    #[test]
    fn test_lower_rank_beats_position() {
        // "abc": "bc" (rank 1) wins over the earlier "ab" (rank 2).
        let tok = tokenizer(
            &["<unk>", "<s>", "</s>", "▁", "a", "b", "c", "ab", "bc"],
            &[(5, 6), (4, 5)],
        );
        assert_eq!(tok.encode("abc", false, false), vec![3, 4, 8]);
    }

    #[test]
    fn test_predecessor_merges_after_right_side_merge() {
        // "▁ab": "ab" first (rank 1), then "▁" + "ab" (rank 2).
        let tok = tokenizer(
            &["<unk>", "<s>", "</s>", "▁", "a", "b", "ab", "▁ab"],
            &[(4, 5), (3, 6)],
        );
        assert_eq!(tok.encode("ab", true, true), vec![1, 7, 2]);
    }

    #[test]
    fn test_decode_skips_only_one_leading_bos() {
        let tok = tokenizer(&["<unk>", "<s>", "</s>", "▁", "a"], &[]);
        assert_eq!(tok.decode(&[1, 3, 4]).unwrap(), "a");
        assert_eq!(tok.decode(&[3, 4]).unwrap(), "a");
        // A second BOS is ordinary text, and its first character is the one dropped.
        assert_eq!(tok.decode(&[1, 1, 3, 4]).unwrap(), "s> a");
    }

    #[test]
    fn test_decode_rejects_unknown_id() {
        let tok = tokenizer(&["<unk>", "<s>", "</s>", "▁", "a"], &[]);
        let err = tok.decode(&[1, 3, 99]).unwrap_err();
        assert!(matches!(err, TokenizerError::InvalidTokenId(99, 5)));
    }
}
