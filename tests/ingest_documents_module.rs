use docvec::ingest::{collect_source_files, load_document, IngestError, SourceKind};
use docvec::shared::{ErrorCode, ServiceError};
use std::fs;
use tempfile::tempdir;

#[test]
fn discovery_is_recursive_sorted_and_case_insensitive() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path();
    fs::create_dir_all(root.join("b/nested")).expect("dirs");
    fs::write(root.join("b/nested/Notes.MD"), "# Notes").expect("md");
    fs::write(root.join("a.json"), "{}").expect("json");
    fs::write(root.join("readme.txt"), "skip").expect("txt");
    fs::write(root.join("image.png"), [0u8, 1, 2]).expect("png");

    let sources = collect_source_files(root).expect("collect");
    let relative: Vec<_> = sources.iter().map(|s| s.relative.as_str()).collect();
    assert_eq!(relative, vec!["a.json", "b/nested/Notes.MD"]);
    assert_eq!(sources[0].kind, SourceKind::Json);
    assert_eq!(sources[1].kind, SourceKind::Markdown);
}

#[test]
fn markdown_keeps_text_and_records_title() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("guide.md"), "intro\n# Install Guide\nrun the tool").expect("md");
    let sources = collect_source_files(dir.path()).expect("collect");
    let doc = load_document(&sources[0]).expect("load");

    assert_eq!(doc.text, "intro\n# Install Guide\nrun the tool");
    assert_eq!(doc.metadata["source_type"], "markdown");
    assert_eq!(doc.metadata["file_name"], "guide.md");
    assert_eq!(doc.metadata["title"], "Install Guide");
    assert_eq!(doc.metadata["word_count"], "7");
}

#[test]
fn json_fields_become_lines_and_metadata() {
    let dir = tempdir().expect("tempdir");
    fs::write(
        dir.path().join("item.json"),
        r#"{"name":"widget","price":3.5,"tags":["a","b"],"source_type":"ignored"}"#,
    )
    .expect("json");
    let sources = collect_source_files(dir.path()).expect("collect");
    let doc = load_document(&sources[0]).expect("load");

    assert!(doc.text.contains("name: widget"));
    assert!(doc.text.contains("price: 3.5"));
    assert!(doc.text.contains(r#"tags: ["a","b"]"#));
    assert_eq!(doc.metadata["name"], "widget");
    assert_eq!(doc.metadata["source_type"], "json");
}

#[test]
fn invalid_utf8_is_replaced_not_rejected() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("odd.md"), [b'o', b'k', 0xff, b'!']).expect("md");
    let sources = collect_source_files(dir.path()).expect("collect");
    let doc = load_document(&sources[0]).expect("load");
    assert_eq!(doc.text, "ok\u{fffd}!");
}

#[test]
fn invalid_json_maps_to_parse_error_code() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("broken.json"), "{not json").expect("json");
    let sources = collect_source_files(dir.path()).expect("collect");
    let err = load_document(&sources[0]).expect_err("invalid json");
    assert!(matches!(err, IngestError::Json { .. }));
    assert_eq!(ServiceError::from(err).code, ErrorCode::JsonParseError);
}
