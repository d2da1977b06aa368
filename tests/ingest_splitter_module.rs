use docvec::ingest::{split_document, split_text, Document, HeuristicTokenizer, SplitterConfig, TokenCount};
use std::collections::BTreeMap;

fn words(count: usize) -> String {
    (0..count)
        .map(|i| format!("word{i:03}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[test]
fn every_segment_respects_the_token_budget() {
    let text = format!(
        "{}\n\n{}\n{}. {}",
        words(40),
        words(25),
        words(30),
        "x".repeat(90)
    );
    let config = SplitterConfig::new(20, 3);
    let segments = split_text(&text, config, &HeuristicTokenizer);
    assert!(segments.len() > 3);
    for segment in &segments {
        let tokens = HeuristicTokenizer.count_tokens(segment);
        assert!(tokens <= 20, "segment has {tokens} tokens: {segment:?}");
    }
}

#[test]
fn later_segments_start_with_overlap_from_predecessor() {
    let text = words(30);
    let segments = split_text(&text, SplitterConfig::new(10, 2), &HeuristicTokenizer);
    assert!(segments.len() >= 2);
    for pair in segments.windows(2) {
        let last_word = pair[0].split_whitespace().last().expect("last word");
        assert!(
            pair[1].starts_with(last_word),
            "{:?} should start with {last_word}",
            pair[1]
        );
    }
}

#[test]
fn zero_overlap_never_repeats_text() {
    let text = words(30);
    let segments = split_text(&text, SplitterConfig::new(10, 0), &HeuristicTokenizer);
    let rejoined = segments.join(" ");
    assert_eq!(rejoined, text);
}

#[test]
fn cjk_text_splits_per_character_budget() {
    let text = "向量化文档处理。".repeat(10);
    let segments = split_text(&text, SplitterConfig::new(12, 0), &HeuristicTokenizer);
    assert!(segments.len() >= 7);
    assert!(segments
        .iter()
        .all(|s| HeuristicTokenizer.count_tokens(s) <= 12));
}

#[test]
fn segments_inherit_metadata_and_index() {
    let mut metadata = BTreeMap::new();
    metadata.insert("file_name".to_string(), "a.md".to_string());
    let document = Document {
        text: words(30),
        metadata,
    };
    let segments = split_document(&document, SplitterConfig::new(10, 0), &HeuristicTokenizer);
    for (index, segment) in segments.iter().enumerate() {
        assert_eq!(segment.metadata["file_name"], "a.md");
        assert_eq!(segment.metadata["index"], index.to_string());
    }
}
