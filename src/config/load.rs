use super::{ConfigError, Settings};
use std::path::Path;

pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    let settings = Settings::from_path_or_default(path)?;
    settings.validate()?;
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.display().to_string(),
            source,
        })?;
    }
    let encoded = serde_yaml::to_string(settings).map_err(|source| ConfigError::Encode {
        path: path.display().to_string(),
        source,
    })?;
    crate::shared::fs_atomic::atomic_write_file(path, encoded.as_bytes()).map_err(|source| {
        ConfigError::Write {
            path: path.display().to_string(),
            source,
        }
    })
}
