use super::{Embedder, EmbeddingError, LOCAL_HASH_MODEL};
use crate::ingest::tokens::is_cjk;

pub const HASH_EMBEDDING_DIM: usize = 64;

/// Deterministic offline embedder: signed feature hashing of lowercased
/// words (CJK characters count as words), L2-normalized.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashingEmbedder;

impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        LOCAL_HASH_MODEL
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(embed_text(text))
    }
}

pub fn embed_text(text: &str) -> Vec<f32> {
    let mut out = vec![0.0_f32; HASH_EMBEDDING_DIM];
    for token in hash_tokens(text) {
        let hash = stable_hash(token.as_bytes());
        let idx = (hash as usize) % HASH_EMBEDDING_DIM;
        let sign = if hash >> 63 == 0 { 1.0_f32 } else { -1.0_f32 };
        let mag = 1.0_f32 + (token.chars().count() as f32 / 32.0_f32);
        out[idx] += sign * mag;
    }

    let norm = out.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for value in &mut out {
            *value /= norm;
        }
    }
    out
}

fn hash_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let flush = |word: &mut String, tokens: &mut Vec<String>| {
        let trimmed = word.trim_matches(|ch: char| !ch.is_alphanumeric());
        if !trimmed.is_empty() {
            tokens.push(trimmed.to_lowercase());
        }
        word.clear();
    };
    for ch in text.chars() {
        if is_cjk(ch) {
            flush(&mut word, &mut tokens);
            if ch.is_alphanumeric() {
                tokens.push(ch.to_string());
            }
        } else if ch.is_whitespace() {
            flush(&mut word, &mut tokens);
        } else {
            word.push(ch);
        }
    }
    flush(&mut word, &mut tokens);
    tokens
}

fn stable_hash(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf29ce484222325_u64;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3_u64);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vectors_are_normalized_and_stable() {
        let first = embed_text("Rust makes systems programming approachable");
        let second = embed_text("rust makes systems programming approachable!");
        assert_eq!(first.len(), HASH_EMBEDDING_DIM);
        assert_eq!(first, second);
        let norm = first.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn cjk_characters_are_hashed_individually() {
        assert_eq!(hash_tokens("向量化 docs"), vec!["向", "量", "化", "docs"]);
    }

    #[test]
    fn bucket_parity_does_not_fix_the_sign() {
        let mut seen = [[false; 2]; 2];
        for i in 0..400 {
            let token = format!("token{i}");
            let hash = stable_hash(token.as_bytes());
            let bucket_parity = ((hash as usize) % HASH_EMBEDDING_DIM) % 2;
            let negative = usize::from(hash >> 63 == 1);
            seen[bucket_parity][negative] = true;
        }
        assert_eq!(seen, [[true; 2]; 2]);

        let vector = embed_text(
            &(0..200).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" "),
        );
        let even_negative = vector.iter().step_by(2).any(|v| *v < 0.0);
        let odd_positive = vector.iter().skip(1).step_by(2).any(|v| *v > 0.0);
        assert!(even_negative && odd_positive);
    }

    #[test]
    fn punctuation_only_text_yields_zero_vector() {
        assert!(embed_text("... !!!").iter().all(|v| *v == 0.0));
    }
}
