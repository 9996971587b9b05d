//! Control tokens and the reserved low id range of the Tekken tokenizer.
//!
//! Tekken reserves ids `[0, num_special)` for control tokens. The byte-pair
//! model itself produces ranks starting at 0, so every rank is shifted up by
//! `num_special` on encode and shifted back on decode.
//!
//! # Id layout
//!
//! | ids | content |
//! |-----|---------|
//! | 0..17 | named control tokens, see [`CONTROL_TOKENS`] |
//! | 17..num_special | `<SPECIAL_0>`, `<SPECIAL_1>`, ... placeholders |
//! | num_special.. | byte-pair ranks + num_special |

use super::tokenizer::TokenizerError;

pub const UNK: &str = "<unk>";
pub const BOS: &str = "<s>";
pub const EOS: &str = "</s>";
pub const BEGIN_INST: &str = "[INST]";
pub const END_INST: &str = "[/INST]";
pub const BEGIN_TOOLS: &str = "[AVAILABLE_TOOLS]";
pub const END_TOOLS: &str = "[/AVAILABLE_TOOLS]";
pub const BEGIN_TOOL_RESULTS: &str = "[TOOL_RESULTS]";
pub const END_TOOL_RESULTS: &str = "[/TOOL_RESULTS]";
pub const TOOL_CALLS: &str = "[TOOL_CALLS]";
pub const IMG: &str = "[IMG]";
pub const PAD: &str = "<pad>";
pub const IMG_BREAK: &str = "[IMG_BREAK]";
pub const IMG_END: &str = "[IMG_END]";
pub const PREFIX: &str = "[PREFIX]";
pub const MIDDLE: &str = "[MIDDLE]";
pub const SUFFIX: &str = "[SUFFIX]";

/// Named control tokens in id order.
pub const CONTROL_TOKENS: [&str; 17] = [
    UNK,
    BOS,
    EOS,
    BEGIN_INST,
    END_INST,
    BEGIN_TOOLS,
    END_TOOLS,
    BEGIN_TOOL_RESULTS,
    END_TOOL_RESULTS,
    TOOL_CALLS,
    IMG,
    PAD,
    IMG_BREAK,
    IMG_END,
    PREFIX,
    MIDDLE,
    SUFFIX,
];

/// What to do with control-token ids when decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialTokenPolicy {
    /// Drop them silently.
    Ignore,
    /// Render their literal names.
    Keep,
    /// Fail with [`TokenizerError::SpecialTokenDecode`].
    Raise,
}

/// Reserved control-token table occupying ids `[0, len)`.
#[derive(Debug, Clone)]
pub struct SpecialTokenTable {
    tokens: Vec<String>,
}

impl SpecialTokenTable {
    /// Build a table of exactly `num_special` entries: the named control
    /// tokens followed by `<SPECIAL_{i}>` placeholders.
    pub fn new(num_special: usize) -> Result<Self, TokenizerError> {
        if num_special < CONTROL_TOKENS.len() {
            return Err(TokenizerError::InvalidConfig(format!(
                "{} special tokens configured, but {} control tokens are required",
                num_special,
                CONTROL_TOKENS.len()
            )));
        }

        let tokens = CONTROL_TOKENS
            .iter()
            .map(|s| s.to_string())
            .chain((0..num_special - CONTROL_TOKENS.len()).map(|i| format!("<SPECIAL_{}>", i)))
            .collect();

        Ok(Self { tokens })
    }

    /// Number of reserved ids.
    #[inline]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[inline]
    pub fn is_special(&self, id: u32) -> bool {
        (id as usize) < self.tokens.len()
    }

    /// Literal name of a reserved id.
    pub fn name(&self, id: u32) -> Option<&str> {
        self.tokens.get(id as usize).map(String::as_str)
    }

    /// Id of a named control token.
    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.tokens.iter().position(|t| t == name).map(|i| i as u32)
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn bos_id(&self) -> u32 {
        1
    }

    pub fn eos_id(&self) -> u32 {
        2
    }

    /// Move a byte-pair rank into the non-special id window.
    #[inline]
    pub fn shift(&self, rank: u32) -> u32 {
        rank + self.tokens.len() as u32
    }

    /// Inverse of [`shift`](Self::shift). Only valid for non-special ids.
    #[inline]
    pub fn unshift(&self, id: u32) -> u32 {
        id - self.tokens.len() as u32
    }

    /// Split `ids` into maximal runs that are uniformly special or non-special.
    ///
    /// Yields `(is_special, run)` in order.
    pub fn runs<'a>(&'a self, ids: &'a [u32]) -> impl Iterator<Item = (bool, &'a [u32])> + 'a {
        ids.chunk_by(move |&a, &b| self.is_special(a) == self.is_special(b))
            .map(move |run| (self.is_special(run[0]), run))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_tokens_come_first() {
        let table = SpecialTokenTable::new(20).unwrap();
        assert_eq!(table.len(), 20);
        assert_eq!(table.name(0), Some("<unk>"));
        assert_eq!(table.name(1), Some("<s>"));
        assert_eq!(table.name(2), Some("</s>"));
        assert_eq!(table.name(9), Some("[TOOL_CALLS]"));
        assert_eq!(table.name(16), Some("[SUFFIX]"));
        assert_eq!(table.name(17), Some("<SPECIAL_0>"));
        assert_eq!(table.name(19), Some("<SPECIAL_2>"));
        assert_eq!(table.name(20), None);
    }

    #[test]
    fn test_bos_eos_match_table_positions() {
        let table = SpecialTokenTable::new(17).unwrap();
        assert_eq!(table.id_of(BOS), Some(table.bos_id()));
        assert_eq!(table.id_of(EOS), Some(table.eos_id()));
        assert_eq!(table.id_of("[IMG_END]"), Some(13));
    }

    #[test]
    fn test_too_few_slots_is_rejected() {
        let err = SpecialTokenTable::new(5).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_shift_roundtrip() {
        let table = SpecialTokenTable::new(1000).unwrap();
        assert_eq!(table.shift(0), 1000);
        assert_eq!(table.unshift(1234), 234);
        assert!(table.is_special(999));
        assert!(!table.is_special(1000));
    }

    #[test]
    fn test_runs_are_maximal_and_ordered() {
        let table = SpecialTokenTable::new(100).unwrap();
        let ids = [1, 5, 6, 200, 300, 7, 400];
        let runs: Vec<(bool, Vec<u32>)> = table
            .runs(&ids)
            .map(|(special, run)| (special, run.to_vec()))
            .collect();
        assert_eq!(
            runs,
            vec![
                (true, vec![1, 5, 6]),
                (false, vec![200, 300]),
                (true, vec![7]),
                (false, vec![400]),
            ]
        );
        assert_eq!(table.runs(&[]).count(), 0);
    }
}
