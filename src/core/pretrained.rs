//! Tokenizer versions, the Mistral model catalog, and the tokenizer factory.
//!
//! Three tokenizer versions exist:
//! - `v1` - 32000 SentencePiece tokens (Mistral 7B, Mixtral 8x7B, Embed)
//! - `v2` - 32768 SentencePiece tokens with `[INST]`/`[/INST]` control tokens
//! - `v3` - 32768 SentencePiece tokens, or the Tekken vocabulary
//!
//! # Example
//!
//! ```no_run
//! use mistral_tokenizer::{DataDir, MistralModel, MistralTokenizer, Tokenizer};
//!
//! let assets = DataDir::new("data");
//! let tokenizer = MistralTokenizer::for_model(MistralModel::MistralNemo, &assets).unwrap();
//! let ids = tokenizer.encode("Hello, world!", true, false);
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rustc_hash::FxHashMap;
use tracing::debug;

use super::sentencepiece::SentencePieceBpe;
use super::tekken::Tekkenizer;
use super::tokenizer::{Tokenizer, TokenizerError};

/// Path of the Tekken document inside an asset source.
pub const TEKKEN_ASSET: &str = "tekken/240718.json";

/// Tokenizer generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenizerVersion {
    V1,
    V2,
    V3,
}

impl TokenizerVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
            Self::V3 => "v3",
        }
    }

    /// Versions that ship a Tekken vocabulary.
    pub fn supports_tekken(&self) -> bool {
        matches!(self, Self::V3)
    }
}

impl FromStr for TokenizerVersion {
    type Err = TokenizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v1" => Ok(Self::V1),
            "v2" => Ok(Self::V2),
            "v3" => Ok(Self::V3),
            other => Err(TokenizerError::UnsupportedVersion(other.to_string())),
        }
    }
}

impl fmt::Display for TokenizerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Models with a known tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MistralModel {
    Codestral22b,
    MistralEmbed,
    MistralLarge,
    MistralNemo,
    MistralSmall,
    OpenMistral7b,
    OpenMixtral8x22b,
    OpenMixtral8x7b,
}

impl MistralModel {
    /// Parse a model name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "codestral-22b" => Some(Self::Codestral22b),
            "mistral-embed" => Some(Self::MistralEmbed),
            "mistral-large" => Some(Self::MistralLarge),
            "mistral-nemo" => Some(Self::MistralNemo),
            "mistral-small" => Some(Self::MistralSmall),
            "open-mistral-7b" => Some(Self::OpenMistral7b),
            "open-mixtral-8x22b" => Some(Self::OpenMixtral8x22b),
            "open-mixtral-8x7b" => Some(Self::OpenMixtral8x7b),
            _ => None,
        }
    }

    /// Get all supported model names.
    pub fn supported_names() -> &'static [&'static str] {
        &[
            "codestral-22b",
            "mistral-embed",
            "mistral-large",
            "mistral-nemo",
            "mistral-small",
            "open-mistral-7b",
            "open-mixtral-8x22b",
            "open-mixtral-8x7b",
        ]
    }

    pub fn tokenizer_version(&self) -> TokenizerVersion {
        match self {
            Self::MistralEmbed | Self::OpenMistral7b | Self::OpenMixtral8x7b => TokenizerVersion::V1,
            Self::MistralLarge | Self::MistralSmall => TokenizerVersion::V2,
            Self::Codestral22b | Self::MistralNemo | Self::OpenMixtral8x22b => TokenizerVersion::V3,
        }
    }

    pub fn uses_tekken(&self) -> bool {
        matches!(self, Self::MistralNemo)
    }
}

impl FromStr for MistralModel {
    type Err = TokenizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            TokenizerError::UnknownModel(format!(
                "{}. Supported: {}",
                s,
                Self::supported_names().join(", ")
            ))
        })
    }
}

/// Where raw tokenizer assets come from.
///
/// Paths are relative and `/`-separated, e.g. `bpe/v1/vocab.bin`.
pub trait AssetSource {
    fn load(&self, path: &str) -> Result<Vec<u8>, TokenizerError>;
}

/// Assets laid out on disk under a root directory:
///
/// ```text
/// <root>/bpe/v1/vocab.bin
/// <root>/bpe/v1/merges.bin
/// <root>/bpe/v2/...
/// <root>/bpe/v3/...
/// <root>/tekken/240718.json
/// ```
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl AssetSource for DataDir {
    fn load(&self, path: &str) -> Result<Vec<u8>, TokenizerError> {
        let full = path
            .split('/')
            .fold(self.root.clone(), |acc, part| acc.join(part));
        Ok(std::fs::read(full)?)
    }
}

/// Assets held in memory, keyed by relative path.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAssets {
    files: FxHashMap<String, Vec<u8>>,
}

impl InMemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), data.into());
    }
}

impl AssetSource for InMemoryAssets {
    fn load(&self, path: &str) -> Result<Vec<u8>, TokenizerError> {
        self.files.get(path).cloned().ok_or_else(|| {
            TokenizerError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("asset not found: {}", path),
            ))
        })
    }
}

/// A SentencePiece or Tekken tokenizer chosen by version and variant.
pub struct MistralTokenizer {
    inner: Box<dyn Tokenizer>,
    version: TokenizerVersion,
    tekken: bool,
}

impl MistralTokenizer {
    /// Build the tokenizer for `version`.
    ///
    /// `use_tekken` selects the Tekken vocabulary, which only `v3` ships.
    /// `multimodal` requires the Tekken document to carry image parameters and
    /// is ignored for SentencePiece.
    pub fn new(
        version: TokenizerVersion,
        use_tekken: bool,
        multimodal: bool,
        assets: &dyn AssetSource,
    ) -> Result<Self, TokenizerError> {
        let inner: Box<dyn Tokenizer> = if use_tekken {
            if !version.supports_tekken() {
                return Err(TokenizerError::InvalidConfig(format!(
                    "no Tekken vocabulary for tokenizer version {}",
                    version
                )));
            }
            let document = assets.load(TEKKEN_ASSET)?;
            Box::new(Tekkenizer::from_json(&document, multimodal)?)
        } else {
            let vocab = assets.load(&format!("bpe/{}/vocab.bin", version))?;
            let merges = assets.load(&format!("bpe/{}/merges.bin", version))?;
            Box::new(SentencePieceBpe::from_payloads(&vocab, &merges)?)
        };

        debug!(%version, tekken = use_tekken, multimodal, "tokenizer selected");

        Ok(Self {
            inner,
            version,
            tekken: use_tekken,
        })
    }

    /// Build the tokenizer a model was trained with.
    pub fn for_model(model: MistralModel, assets: &dyn AssetSource) -> Result<Self, TokenizerError> {
        Self::new(model.tokenizer_version(), model.uses_tekken(), false, assets)
    }

    /// Build the tokenizer for a model given by name.
    pub fn for_model_name(name: &str, assets: &dyn AssetSource) -> Result<Self, TokenizerError> {
        Self::for_model(name.parse()?, assets)
    }

    pub fn version(&self) -> TokenizerVersion {
        self.version
    }

    pub fn is_tekken(&self) -> bool {
        self.tekken
    }
}

impl Tokenizer for MistralTokenizer {
    fn vocab_size(&self) -> usize {
        self.inner.vocab_size()
    }

    fn vocab(&self) -> &[String] {
        self.inner.vocab()
    }

    fn bos_id(&self) -> u32 {
        self.inner.bos_id()
    }

    fn eos_id(&self) -> u32 {
        self.inner.eos_id()
    }

    fn encode(&self, text: &str, add_bos: bool, add_eos: bool) -> Vec<u32> {
        self.inner.encode(text, add_bos, add_eos)
    }

    fn decode(&self, ids: &[u32]) -> Result<String, TokenizerError> {
        self.inner.decode(ids)
    }
}
