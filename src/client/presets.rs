use crate::embedding::LOCAL_HASH_MODEL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelPreset {
    pub value: &'static str,
    pub label: &'static str,
    pub warning: Option<&'static str>,
    /// Whether the model is reached over HTTP and needs a URL and key.
    pub remote: bool,
}

pub const MODEL_PRESETS: [ModelPreset; 3] = [
    ModelPreset {
        value: "doubao-embedding-text-240715",
        label: "Doubao doubao-embedding-text-240715",
        warning: Some(
            "before use make sure that:\n1. the model is enabled for your Doubao (Volcengine Ark) account\n2. the API key has enough quota\n3. the API base URL is correct",
        ),
        remote: true,
    },
    ModelPreset {
        value: "text-embedding-v1",
        label: "Tongyi Qianwen text-embedding-v1",
        warning: Some(
            "before use make sure that:\n1. the model is enabled for your DashScope account\n2. the API key has enough quota\n3. the API base URL is correct",
        ),
        remote: true,
    },
    ModelPreset {
        value: LOCAL_HASH_MODEL,
        label: "local-hash (offline, no API key)",
        warning: None,
        remote: false,
    },
];

pub const API_URL_PRESETS: [&str; 2] = [
    "https://ark.cn-beijing.volces.com/api/v3",
    "https://dashscope.aliyuncs.com/compatible-mode/v1",
];

pub fn model_preset(value: &str) -> Option<&'static ModelPreset> {
    MODEL_PRESETS.iter().find(|preset| preset.value == value.trim())
}

pub fn preset_lines() -> Vec<String> {
    let mut lines = vec!["models:".to_string()];
    for preset in &MODEL_PRESETS {
        lines.push(format!("  {:<32} {}", preset.value, preset.label));
    }
    lines.push("api urls:".to_string());
    for url in API_URL_PRESETS {
        lines.push(format!("  {url}"));
    }
    lines
}
