use docvec::client::{render_field_errors, SubmissionForm};
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

fn fields(form: &SubmissionForm) -> Vec<&'static str> {
    form.validate()
        .expect_err("form should be invalid")
        .into_iter()
        .map(|err| err.field)
        .collect()
}

#[test]
fn empty_form_reports_every_required_field() {
    let form = SubmissionForm::default();
    assert_eq!(fields(&form), vec!["modelType", "baseUrl", "apiKey", "file"]);
}

#[test]
fn local_model_skips_url_and_key() {
    let dir = tempdir().expect("tempdir");
    let archive = dir.path().join("docs.tar.gz");
    fs::write(&archive, b"placeholder").expect("archive");
    let submission = SubmissionForm {
        model_type: Some("local-hash".to_string()),
        file: Some(archive.clone()),
        ..SubmissionForm::default()
    }
    .validate()
    .expect("valid");
    assert_eq!(submission.file, archive);
    assert_eq!(submission.file_name(), "docs.tar.gz");
    assert_eq!(submission.max_tokens_per_chunk, 1000);
    assert_eq!(submission.overlap_tokens, 10);
    assert!(submission.base_url.is_empty());
}

#[test]
fn remote_model_normalizes_base_url_and_numbers() {
    let dir = tempdir().expect("tempdir");
    let archive = dir.path().join("docs.zip");
    fs::write(&archive, b"placeholder").expect("archive");
    let submission = SubmissionForm {
        model_type: Some("text-embedding-v1".to_string()),
        base_url: Some(" https://dashscope.example.com/compatible-mode/v1/ ".to_string()),
        api_key: Some("sk-live".to_string()),
        file: Some(archive),
        max_tokens_per_chunk: Some("512".to_string()),
        overlap_tokens: Some("0".to_string()),
    }
    .validate()
    .expect("valid");
    assert_eq!(
        submission.base_url,
        "https://dashscope.example.com/compatible-mode/v1"
    );
    assert_eq!(submission.max_tokens_per_chunk, 512);
    assert_eq!(submission.overlap_tokens, 0);
}

#[test]
fn bad_values_are_reported_per_field() {
    let form = SubmissionForm {
        model_type: Some("text-embedding-v1".to_string()),
        base_url: Some("ftp://example.com".to_string()),
        api_key: Some("sk".to_string()),
        file: Some(PathBuf::from("/definitely/not/here.zip")),
        max_tokens_per_chunk: Some("0".to_string()),
        overlap_tokens: Some("-3".to_string()),
    };
    let errors = form.validate().expect_err("invalid");
    let rendered = render_field_errors(&errors);
    assert!(rendered.contains("baseUrl: the API base URL must start with http:// or https://"));
    assert!(rendered.contains("does not exist"));
    assert!(rendered.contains("maxTokensPerChunk: must be a positive integer"));
    assert!(rendered.contains("overlapTokens: must be a non-negative integer"));
    assert_eq!(errors.len(), 4);
}

#[test]
fn unsupported_archive_extension_is_rejected_before_existence_check() {
    let form = SubmissionForm {
        model_type: Some("local-hash".to_string()),
        file: Some(PathBuf::from("/missing/docs.rar")),
        ..SubmissionForm::default()
    };
    let errors = form.validate().expect_err("invalid");
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].message,
        "only .zip, .tar, .tar.gz, .tgz and .gz archives are supported"
    );
}
