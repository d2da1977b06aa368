/// Token estimator used to size chunks.
pub trait TokenCount: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
}

/// Offline estimate: every CJK character is one token, every other
/// whitespace-delimited run costs one token per four characters (rounded up).
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTokenizer;

impl TokenCount for HeuristicTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        let mut tokens = 0;
        let mut run = 0usize;
        for ch in text.chars() {
            if is_cjk(ch) {
                tokens += run.div_ceil(4) + 1;
                run = 0;
            } else if ch.is_whitespace() {
                tokens += run.div_ceil(4);
                run = 0;
            } else {
                run += 1;
            }
        }
        tokens + run.div_ceil(4)
    }
}

pub fn is_cjk(ch: char) -> bool {
    matches!(
        ch as u32,
        0x3000..=0x303F
            | 0x3040..=0x30FF
            | 0x3400..=0x4DBF
            | 0x4E00..=0x9FFF
            | 0xAC00..=0xD7AF
            | 0xF900..=0xFAFF
            | 0xFF00..=0xFFEF
            | 0x20000..=0x2A6DF
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin_words_round_up_per_four_chars() {
        let counter = HeuristicTokenizer;
        assert_eq!(counter.count_tokens(""), 0);
        assert_eq!(counter.count_tokens("   "), 0);
        assert_eq!(counter.count_tokens("a"), 1);
        assert_eq!(counter.count_tokens("abcd"), 1);
        assert_eq!(counter.count_tokens("abcde fg"), 3);
    }

    #[test]
    fn cjk_characters_count_individually() {
        let counter = HeuristicTokenizer;
        assert_eq!(counter.count_tokens("你好世界"), 4);
        assert_eq!(counter.count_tokens("rust是好的"), 4);
    }
}
