use super::IngestError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Markdown,
    Json,
}

impl SourceKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".md") {
            Some(Self::Markdown)
        } else if lower.ends_with(".json") {
            Some(Self::Json)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Json => "json",
        }
    }
}

pub fn is_source_name(name: &str) -> bool {
    SourceKind::from_name(name).is_some()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the extraction root, `/`-separated.
    pub relative: String,
    pub kind: SourceKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Recursively finds `.md`/`.json` files under `root`, sorted by relative path.
pub fn collect_source_files(root: &Path) -> Result<Vec<SourceFile>, IngestError> {
    let mut out = Vec::new();
    walk(root, root, &mut out)?;
    out.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(out)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<SourceFile>) -> Result<(), IngestError> {
    let read_err = |source| IngestError::Read {
        path: dir.display().to_string(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(read_err)?;
        if file_type.is_dir() {
            walk(root, &path, out)?;
            continue;
        }
        if !file_type.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(kind) = SourceKind::from_name(&name) else {
            continue;
        };
        let relative = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .components()
            .map(|part| part.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        out.push(SourceFile {
            path,
            relative,
            kind,
        });
    }
    Ok(())
}

pub fn load_document(source: &SourceFile) -> Result<Document, IngestError> {
    let bytes = fs::read(&source.path).map_err(|err| IngestError::Read {
        path: source.path.display().to_string(),
        source: err,
    })?;
    let raw = String::from_utf8_lossy(&bytes);
    let file_name = source
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.relative.clone());

    match source.kind {
        SourceKind::Markdown => Ok(markdown_document(&raw, &file_name, &source.relative)),
        SourceKind::Json => {
            let value: Value =
                serde_json::from_str(&raw).map_err(|err| IngestError::Json {
                    path: source.relative.clone(),
                    source: err,
                })?;
            Ok(json_document(&value, &file_name, &source.relative))
        }
    }
}

pub fn markdown_document(raw: &str, file_name: &str, relative: &str) -> Document {
    let mut metadata = BTreeMap::new();
    metadata.insert("source_type".to_string(), SourceKind::Markdown.as_str().to_string());
    metadata.insert("file_name".to_string(), file_name.to_string());
    metadata.insert("source".to_string(), relative.to_string());
    if let Some(title) = raw
        .lines()
        .find_map(|line| line.trim_start().strip_prefix("# "))
        .map(str::trim)
        .filter(|title| !title.is_empty())
    {
        metadata.insert("title".to_string(), title.to_string());
    }
    metadata.insert(
        "word_count".to_string(),
        raw.split_whitespace().count().to_string(),
    );
    metadata.insert("char_count".to_string(), raw.chars().count().to_string());
    Document {
        text: raw.to_string(),
        metadata,
    }
}

/// Objects become one `key: value` line per field, with each field copied
/// into metadata. Reserved metadata keys are written last and win.
pub fn json_document(value: &Value, file_name: &str, relative: &str) -> Document {
    let mut metadata = BTreeMap::new();
    let text = match value {
        Value::Object(fields) => {
            let mut ordered = fields.iter().collect::<Vec<_>>();
            ordered.sort_by(|a, b| a.0.cmp(b.0));
            let mut lines = Vec::with_capacity(ordered.len());
            for (key, field) in ordered {
                let rendered = render_json_scalar(field);
                lines.push(format!("{key}: {rendered}"));
                metadata.insert(key.clone(), rendered);
            }
            lines.join("\n")
        }
        other => other.to_string(),
    };
    metadata.insert("source_type".to_string(), SourceKind::Json.as_str().to_string());
    metadata.insert("file_name".to_string(), file_name.to_string());
    metadata.insert("source".to_string(), relative.to_string());
    Document { text, metadata }
}

fn render_json_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
