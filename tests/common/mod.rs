#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD, Engine};
use mistral_tokenizer::InMemoryAssets;

/// Small SentencePiece vocabulary:
/// - 0..=2: `<unk>`, `<s>`, `</s>`
/// - 3..=258: `<0x00>`..`<0xFF>` (byte `b` has id `3 + b`)
/// - 259..: pieces and merge products
pub const SP_PIECES: &[&str] = &[
    "▁", "a", "b", "x", "o", "#", "▁▁", "##", "ax", "▁a", "▁▁▁▁", "oo", "bo", "boo", "▁ax", "é",
];

/// Merges in rank order (rank 1 first).
pub const SP_MERGES: &[(&str, &str)] = &[
    ("#", "#"),
    ("▁", "▁"),
    ("a", "x"),
    ("▁▁", "▁▁"),
    ("o", "o"),
    ("b", "oo"),
    ("▁", "a"),
    ("▁", "ax"),
    ("b", "o"),
];

pub const TEKKEN_NUM_SPECIAL: usize = 1000;
pub const TEKKEN_NUM_RANKS: usize = 260;

pub const TEKKEN_PATTERN: &str = r"[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}]*[\p{Ll}\p{Lm}\p{Lo}\p{M}]+|[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}]+[\p{Ll}\p{Lm}\p{Lo}\p{M}]*|\p{N}| ?[^\s\p{L}\p{N}]+[\r\n/]*|\s*[\r\n]+|\s+(?!\S)|\s+";

pub fn sp_tokens() -> Vec<String> {
    let mut tokens = vec!["<unk>".to_string(), "<s>".to_string(), "</s>".to_string()];
    tokens.extend((0..=255u8).map(|b| format!("<0x{:02X}>", b)));
    tokens.extend(SP_PIECES.iter().map(|s| s.to_string()));
    tokens
}

/// Id of a token in the SentencePiece fixture.
pub fn sp_id(token: &str) -> u32 {
    sp_tokens()
        .iter()
        .position(|t| t == token)
        .unwrap_or_else(|| panic!("{} not in fixture vocabulary", token)) as u32
}

/// Base64 `vocab.bin` payload.
pub fn sp_vocab_payload() -> String {
    STANDARD.encode(sp_tokens().join("\n"))
}

/// Base64 `merges.bin` payload.
pub fn sp_merges_payload() -> String {
    let mut bytes = Vec::new();
    for (left, right) in SP_MERGES {
        bytes.extend_from_slice(&(sp_id(left) as u16).to_le_bytes());
        bytes.extend_from_slice(&(sp_id(right) as u16).to_le_bytes());
    }
    STANDARD.encode(bytes)
}

/// Compressed rank table: every single byte (rank = byte value), then
/// "he", "ll", "hell", "hello" at ranks 256..=259.
pub fn tekken_ranks() -> String {
    let mut tokens: Vec<Vec<u8>> = (0..=255u8).map(|b| vec![b]).collect();
    for merged in ["he", "ll", "hell", "hello"] {
        tokens.push(merged.as_bytes().to_vec());
    }
    let encoded: Vec<String> = tokens.iter().map(|t| STANDARD.encode(t)).collect();
    format!("! 0 {}\n", encoded.join(" "))
}

pub fn tekken_document(version: &str, multimodal: bool) -> Vec<u8> {
    let mut doc = serde_json::json!({
        "config": {
            "pattern": TEKKEN_PATTERN,
            "num_vocab_tokens": TEKKEN_NUM_RANKS,
            "default_vocab_size": TEKKEN_NUM_SPECIAL + TEKKEN_NUM_RANKS,
            "default_num_special_tokens": TEKKEN_NUM_SPECIAL,
            "version": version,
        },
        "bpe_ranks": tekken_ranks(),
    });
    if multimodal {
        doc["multimodal"] = serde_json::json!({"image_patch_size": 16, "max_image_size": 1024});
    }
    serde_json::to_vec(&doc).expect("Failed to serialize Tekken document")
}

/// Id the Tekken fixture assigns to byte-pair rank `rank`.
pub fn tekken_id(rank: u32) -> u32 {
    rank + TEKKEN_NUM_SPECIAL as u32
}

/// Every asset the factory can ask for, in the on-disk layout.
pub fn assets(multimodal: bool) -> InMemoryAssets {
    let mut assets = InMemoryAssets::new();
    for version in ["v1", "v2", "v3"] {
        assets.insert(format!("bpe/{}/vocab.bin", version), sp_vocab_payload());
        assets.insert(format!("bpe/{}/merges.bin", version), sp_merges_payload());
    }
    assets.insert("tekken/240718.json", tekken_document("v3", multimodal));
    assets
}
