//! Mistral tokenizers in Rust.
//!
//! Reproduces the SentencePiece-BPE (v1/v2/v3) and Tekken tokenizers id for
//! id:
//! - Greedy lowest-rank merging with left-to-right tie-breaking
//! - `<0xNN>` byte fallback for characters outside the vocabulary
//! - Reserved control-token ids with ignore/keep/raise decode policies
//! - Rayon parallelism for batch encode/decode
//! - Optional Python bindings (`python` feature)

pub mod core;
#[cfg(feature = "python")]
mod python;

pub use crate::core::{
    AssetSource, DataDir, InMemoryAssets, MistralModel, MistralTokenizer, SentencePieceBpe,
    SpecialTokenPolicy, Tekkenizer, Tokenizer, TokenizerError, TokenizerVersion,
};
