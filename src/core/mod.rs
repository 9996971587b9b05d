//! Core tokenization engines.
//!
//! # Architecture
//!
//! - [`SentencePieceBpe`]: greedy-merge SentencePiece BPE (v1/v2/v3 32k
//!   vocabularies) over an index-addressed token chain and a [`heap`] of
//!   merge candidates
//! - [`Tekkenizer`]: Tekken tokenizer, a regex-segmented byte-pair engine
//!   behind a [`SpecialTokenTable`] of reserved control ids
//! - [`vocab`]: base64 vocabulary/merge payloads and tiktoken rank tables
//! - [`MistralTokenizer`]: picks one of the two from a version and variant
//!
//! Both tokenizers implement the [`Tokenizer`] trait.

mod bpe;
pub mod heap;
pub mod pretrained;
pub mod sentencepiece;
pub mod special;
pub mod tekken;
mod tiktoken;
mod tokenizer;
pub mod vocab;

pub use bpe::byte_pair_encode;
pub use pretrained::{
    AssetSource, DataDir, InMemoryAssets, MistralModel, MistralTokenizer, TokenizerVersion,
    TEKKEN_ASSET,
};
pub use sentencepiece::SentencePieceBpe;
pub use special::{SpecialTokenPolicy, SpecialTokenTable};
pub use tekken::{MultimodalConfig, TekkenConfig, TekkenData, Tekkenizer};
pub use tiktoken::TiktokenBpe;
pub use tokenizer::{Tokenizer, TokenizerError};
pub use vocab::VocabError;
