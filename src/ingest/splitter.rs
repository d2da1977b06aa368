use super::documents::Document;
use super::tokens::{is_cjk, TokenCount};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitterConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

impl SplitterConfig {
    /// Clamps the values so that `0 < max_tokens` and `overlap_tokens < max_tokens`.
    pub fn new(max_tokens: usize, overlap_tokens: usize) -> Self {
        let max_tokens = max_tokens.max(1);
        Self {
            max_tokens,
            overlap_tokens: overlap_tokens.min(max_tokens - 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Paragraph,
    Line,
    Sentence,
    Word,
    Char,
}

impl Level {
    fn next(self) -> Option<Self> {
        match self {
            Self::Paragraph => Some(Self::Line),
            Self::Line => Some(Self::Sentence),
            Self::Sentence => Some(Self::Word),
            Self::Word => Some(Self::Char),
            Self::Char => None,
        }
    }
}

/// Splits one document into segments of at most `max_tokens` estimated
/// tokens. Each segment after the first starts with up to `overlap_tokens`
/// of trailing context from its predecessor and carries the document metadata
/// plus its zero-based `index`.
pub fn split_document(
    document: &Document,
    config: SplitterConfig,
    counter: &dyn TokenCount,
) -> Vec<Segment> {
    split_text(&document.text, config, counter)
        .into_iter()
        .enumerate()
        .map(|(index, text)| {
            let mut metadata = document.metadata.clone();
            metadata.insert("index".to_string(), index.to_string());
            Segment { text, metadata }
        })
        .collect()
}

pub fn split_text(text: &str, config: SplitterConfig, counter: &dyn TokenCount) -> Vec<String> {
    let config = SplitterConfig::new(config.max_tokens, config.overlap_tokens);
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut atoms = Vec::new();
    collect_atoms(text, Some(Level::Paragraph), config.max_tokens, counter, &mut atoms);

    let mut segments: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0usize;
    for (atom, tokens) in atoms {
        if current_tokens + tokens <= config.max_tokens || current.trim().is_empty() {
            current.push_str(atom);
            current_tokens += tokens;
            continue;
        }
        push_segment(&mut segments, &current);

        current.clear();
        current_tokens = 0;
        if let Some(previous) = segments.last() {
            let tail = overlap_tail(previous, config.overlap_tokens, counter);
            let tail_tokens = counter.count_tokens(&tail);
            if !tail.is_empty() && tail_tokens + tokens <= config.max_tokens {
                current.push_str(&tail);
                if needs_separator(&tail, atom) {
                    current.push(' ');
                }
                current_tokens = tail_tokens;
            }
        }
        current.push_str(atom);
        current_tokens += tokens;
    }
    push_segment(&mut segments, &current);
    segments
}

fn push_segment(segments: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        segments.push(trimmed.to_string());
    }
}

fn collect_atoms<'a>(
    text: &'a str,
    level: Option<Level>,
    max_tokens: usize,
    counter: &dyn TokenCount,
    out: &mut Vec<(&'a str, usize)>,
) {
    let tokens = counter.count_tokens(text);
    let Some(level) = level.filter(|_| tokens > max_tokens) else {
        out.push((text, tokens));
        return;
    };
    let pieces = split_pieces(text, level);
    if pieces.len() <= 1 {
        collect_atoms(text, level.next(), max_tokens, counter, out);
        return;
    }
    for piece in pieces {
        collect_atoms(piece, level.next(), max_tokens, counter, out);
    }
}

/// Splits without dropping characters: every piece keeps its trailing
/// separator, so concatenating the pieces restores `text`.
fn split_pieces(text: &str, level: Level) -> Vec<&str> {
    let pieces: Vec<&str> = match level {
        Level::Paragraph => text.split_inclusive("\n\n").collect(),
        Level::Line => text.split_inclusive('\n').collect(),
        Level::Sentence => split_sentences(text),
        Level::Word => text.split_inclusive(char::is_whitespace).collect(),
        Level::Char => text
            .char_indices()
            .map(|(start, ch)| &text[start..start + ch.len_utf8()])
            .collect(),
    };
    pieces.into_iter().filter(|piece| !piece.is_empty()).collect()
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((index, ch)) = chars.next() {
        let terminal = matches!(ch, '.' | '!' | '?' | '。' | '！' | '？');
        if !terminal {
            continue;
        }
        let next_is_break = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
        if !next_is_break && !is_cjk(ch) {
            continue;
        }
        let mut end = index + ch.len_utf8();
        while let Some(&(ws_index, ws)) = chars.peek() {
            if !ws.is_whitespace() {
                break;
            }
            end = ws_index + ws.len_utf8();
            chars.next();
        }
        pieces.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

/// Trailing context of at most `overlap_tokens`, taken on word boundaries
/// and falling back to characters when the last word alone is too large.
fn overlap_tail(segment: &str, overlap_tokens: usize, counter: &dyn TokenCount) -> String {
    if overlap_tokens == 0 {
        return String::new();
    }
    let mut words = Vec::new();
    let mut used = 0;
    for word in segment.split_whitespace().rev() {
        let cost = counter.count_tokens(word);
        if used + cost > overlap_tokens {
            break;
        }
        used += cost;
        words.push(word);
    }
    if !words.is_empty() {
        words.reverse();
        return words.join(" ");
    }

    let mut tail: Vec<char> = Vec::new();
    for ch in segment.chars().rev() {
        tail.push(ch);
        let candidate = tail.iter().rev().collect::<String>();
        if counter.count_tokens(&candidate) > overlap_tokens {
            tail.pop();
            break;
        }
    }
    tail.iter().rev().collect::<String>().trim().to_string()
}

fn needs_separator(tail: &str, atom: &str) -> bool {
    let tail_end = tail.chars().last();
    let atom_start = atom.chars().next();
    match (tail_end, atom_start) {
        (Some(end), Some(start)) => {
            !end.is_whitespace() && !start.is_whitespace() && !is_cjk(end) && !is_cjk(start)
        }
        _ => false,
    }
}
