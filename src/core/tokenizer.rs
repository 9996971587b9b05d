use rayon::prelude::*;
use thiserror::Error;

use super::vocab::VocabError;

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("Vocabulary error: {0}")]
    VocabError(#[from] VocabError),
    #[error("Regex compilation error: {0}")]
    RegexError(#[from] fancy_regex::Error),
    #[error("Invalid tokenizer JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to read tokenizer asset: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Unsupported tokenizer version: {0}")]
    UnsupportedVersion(String),
    #[error("Multimodal configuration is required for multimodal tokenizers")]
    MissingMultimodal,
    #[error("Invalid tokenizer configuration: {0}")]
    InvalidConfig(String),
    #[error("Vocabulary has no {0} token")]
    MissingSpecialToken(String),
    #[error("Unknown model: {0}")]
    UnknownModel(String),
    #[error("Decoding tokens that contain special tokens ({0:?}) is not allowed")]
    SpecialTokenDecode(Vec<u32>),
    #[error("Token id {0} is outside the vocabulary of {1} entries")]
    InvalidTokenId(u32, usize),
}

impl TokenizerError {
    /// Whether this error was raised while building a tokenizer, as opposed
    /// to while decoding ids.
    pub fn is_configuration_error(&self) -> bool {
        !matches!(
            self,
            TokenizerError::SpecialTokenDecode(_) | TokenizerError::InvalidTokenId(..)
        )
    }
}

/// Common surface of the SentencePiece and Tekken tokenizers.
///
/// Implementations hold only immutable tables after construction, so a single
/// instance can be shared across threads and encode/decode called concurrently.
pub trait Tokenizer: Send + Sync {
    /// Number of token ids, including control tokens.
    fn vocab_size(&self) -> usize;

    /// Every token as a string, indexed by id.
    fn vocab(&self) -> &[String];

    fn bos_id(&self) -> u32;

    fn eos_id(&self) -> u32;

    /// Encode text to token ids, optionally framed with BOS/EOS.
    fn encode(&self, text: &str, add_bos: bool, add_eos: bool) -> Vec<u32>;

    /// Decode token ids to text. A leading BOS is stripped.
    fn decode(&self, ids: &[u32]) -> Result<String, TokenizerError>;

    /// Batch encode multiple texts in parallel.
    fn encode_batch(&self, texts: &[String], add_bos: bool, add_eos: bool) -> Vec<Vec<u32>> {
        texts
            .par_iter()
            .map(|text| self.encode(text, add_bos, add_eos))
            .collect()
    }

    /// Batch decode multiple token lists in parallel.
    fn decode_batch(&self, token_lists: &[Vec<u32>]) -> Result<Vec<String>, TokenizerError> {
        token_lists
            .par_iter()
            .map(|tokens| self.decode(tokens))
            .collect()
    }
}
