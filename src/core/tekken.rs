//! Tekken tokenizer: tiktoken-style byte-pair ranks behind a reserved block of
//! control-token ids.
//!
//! The asset is a JSON document:
//!
//! ```json
//! {
//!   "config": {
//!     "pattern": "...",
//!     "num_vocab_tokens": 150000,
//!     "default_vocab_size": 131072,
//!     "default_num_special_tokens": 1000,
//!     "version": "v3"
//!   },
//!   "bpe_ranks": "! 0 AA== AQ== ...",
//!   "multimodal": { "image_patch_size": 16, "max_image_size": 1024 }
//! }
//! ```
//!
//! Ranks at or beyond `default_vocab_size - default_num_special_tokens` are
//! dropped at load time so that every shifted id stays inside the vocabulary.

use serde::Deserialize;
use tracing::{debug, warn};

use super::pretrained::TokenizerVersion;
use super::special::{SpecialTokenPolicy, SpecialTokenTable};
use super::tiktoken::TiktokenBpe;
use super::tokenizer::{Tokenizer, TokenizerError};
use super::vocab::load_tiktoken_bpe;

/// `config` section of a Tekken document.
#[derive(Debug, Clone, Deserialize)]
pub struct TekkenConfig {
    pub pattern: String,
    #[serde(default)]
    pub num_vocab_tokens: Option<usize>,
    pub default_vocab_size: usize,
    pub default_num_special_tokens: usize,
    pub version: String,
}

/// Image parameters carried by multimodal Tekken documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MultimodalConfig {
    pub image_patch_size: u32,
    pub max_image_size: u32,
}

/// A parsed Tekken document.
#[derive(Debug, Clone, Deserialize)]
pub struct TekkenData {
    pub config: TekkenConfig,
    pub bpe_ranks: String,
    #[serde(default)]
    pub multimodal: Option<MultimodalConfig>,
}

pub struct Tekkenizer {
    model: TiktokenBpe,
    specials: SpecialTokenTable,
    vocab_size: usize,
    vocab: Vec<String>,
    version: TokenizerVersion,
    multimodal: Option<MultimodalConfig>,
}

impl Tekkenizer {
    /// Parse a Tekken JSON document and build the tokenizer.
    ///
    /// `multimodal` requests the image parameters; it is an error if the
    /// document has none.
    pub fn from_json(json: &[u8], multimodal: bool) -> Result<Self, TokenizerError> {
        let data: TekkenData = serde_json::from_slice(json)?;
        Self::from_data(data, multimodal)
    }

    pub fn from_data(data: TekkenData, multimodal: bool) -> Result<Self, TokenizerError> {
        let TekkenData {
            config,
            bpe_ranks,
            multimodal: multimodal_config,
        } = data;

        let version: TokenizerVersion = config.version.parse()?;
        if multimodal && multimodal_config.is_none() {
            return Err(TokenizerError::MissingMultimodal);
        }

        let specials = SpecialTokenTable::new(config.default_num_special_tokens)?;
        let vocab_size = config.default_vocab_size;
        if vocab_size < specials.len() {
            return Err(TokenizerError::InvalidConfig(format!(
                "vocabulary size {} is smaller than the {} reserved special tokens",
                vocab_size,
                specials.len()
            )));
        }

        let mut encoder = load_tiktoken_bpe(bpe_ranks.as_bytes())?;
        if let Some(expected) = config.num_vocab_tokens {
            if expected != encoder.len() {
                warn!(
                    expected,
                    loaded = encoder.len(),
                    "rank table size does not match num_vocab_tokens"
                );
            }
        }
        let max_rank = (vocab_size - specials.len()) as u32;
        encoder.retain(|_, rank| *rank < max_rank);

        let model = TiktokenBpe::new(encoder, &config.pattern)?;

        let mut tokenizer = Self {
            model,
            specials,
            vocab_size,
            vocab: Vec::new(),
            version,
            multimodal: multimodal_config,
        };
        tokenizer.vocab = (0..vocab_size as u32)
            .map(|id| tokenizer.decode_with_policy(&[id], SpecialTokenPolicy::Keep))
            .collect::<Result<_, _>>()?;

        debug!(
            vocab_size,
            num_special = tokenizer.specials.len(),
            ranks = tokenizer.model.n_ranks(),
            version = %version,
            "Tekken tokenizer initialized"
        );

        Ok(tokenizer)
    }

    pub fn version(&self) -> TokenizerVersion {
        self.version
    }

    pub fn num_special_tokens(&self) -> usize {
        self.specials.len()
    }

    pub fn multimodal(&self) -> Option<&MultimodalConfig> {
        self.multimodal.as_ref()
    }

    /// Names of the reserved ids `[0, num_special_tokens)`.
    pub fn special_tokens(&self) -> &[String] {
        self.specials.tokens()
    }

    /// Decode `ids` without BOS stripping, handling control-token runs with
    /// `policy`.
    ///
    /// Ids are split into maximal runs of control and non-control tokens.
    /// Non-control runs go through the byte-pair decoder as one unit; control
    /// runs are dropped, rendered by name, or rejected.
    pub fn decode_with_policy(
        &self,
        ids: &[u32],
        policy: SpecialTokenPolicy,
    ) -> Result<String, TokenizerError> {
        let mut text = String::new();

        for (is_special, run) in self.specials.runs(ids) {
            if !is_special {
                let ranks: Vec<u32> = run.iter().map(|&id| self.specials.unshift(id)).collect();
                text.push_str(&self.model.decode_lossy(&ranks));
                continue;
            }

            match policy {
                SpecialTokenPolicy::Raise => {
                    return Err(TokenizerError::SpecialTokenDecode(run.to_vec()));
                }
                SpecialTokenPolicy::Keep => {
                    for &id in run {
                        text.push_str(self.specials.name(id).unwrap_or_default());
                    }
                }
                SpecialTokenPolicy::Ignore => {}
            }
        }

        Ok(text)
    }
}

impl Tokenizer for Tekkenizer {
    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn vocab(&self) -> &[String] {
        &self.vocab
    }

    fn bos_id(&self) -> u32 {
        self.specials.bos_id()
    }

    fn eos_id(&self) -> u32 {
        self.specials.eos_id()
    }

    fn encode(&self, text: &str, add_bos: bool, add_eos: bool) -> Vec<u32> {
        let ranks = self.model.encode(text);

        let mut ids = Vec::with_capacity(ranks.len() + 2);
        if add_bos {
            ids.push(self.bos_id());
        }
        ids.extend(ranks.into_iter().map(|rank| self.specials.shift(rank)));
        if add_eos {
            ids.push(self.eos_id());
        }
        ids
    }

    /// Decode content ids. A single leading BOS is skipped; any other control
    /// token is an error.
    fn decode(&self, ids: &[u32]) -> Result<String, TokenizerError> {
        let ids = match ids.first() {
            Some(&first) if first == self.bos_id() => &ids[1..],
            _ => ids,
        };
        self.decode_with_policy(ids, SpecialTokenPolicy::Raise)
    }
}
