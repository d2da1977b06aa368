use super::StatePaths;
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;

pub fn append_service_log(paths: &StatePaths, level: &str, event: &str, message: &str) {
    append_service_event(paths, level, event, message, Map::new());
}

/// Appends one JSON line to `logs/service.log`. Extra `fields` are merged
/// after the fixed keys and never override them.
pub fn append_service_event(
    paths: &StatePaths,
    level: &str,
    event: &str,
    message: &str,
    fields: Map<String, Value>,
) {
    match level {
        "error" => tracing::error!(event, "{message}"),
        "warn" => tracing::warn!(event, "{message}"),
        _ => tracing::info!(event, "{message}"),
    }

    let mut payload = Map::new();
    payload.insert("timestamp".to_string(), Value::from(super::now_secs()));
    payload.insert("level".to_string(), Value::from(level));
    payload.insert("event".to_string(), Value::from(event));
    payload.insert("message".to_string(), Value::from(message));
    for (key, value) in fields {
        payload.entry(key).or_insert(value);
    }

    let Ok(line) = serde_json::to_string(&Value::Object(payload)) else {
        return;
    };

    let path = paths.service_log_path();
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(mut file) = fs::OpenOptions::new().create(true).append(true).open(path) else {
        return;
    };
    let _ = writeln!(file, "{line}");
}

/// Builds the `fields` map for [`append_service_event`].
pub fn log_fields<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
