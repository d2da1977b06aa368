use crate::config::ConfigError;
use std::path::PathBuf;

pub const GLOBAL_STATE_DIR: &str = ".docvec";
pub const GLOBAL_SETTINGS_FILE_NAME: &str = "config.yaml";
pub const STATE_ROOT_ENV: &str = "DOCVEC_HOME";

/// `$DOCVEC_HOME` when set, otherwise `$HOME/.docvec`.
pub fn default_state_root() -> Result<PathBuf, ConfigError> {
    if let Some(root) = std::env::var_os(STATE_ROOT_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(root));
    }
    let home = std::env::var_os("HOME").ok_or(ConfigError::HomeDirectoryUnavailable)?;
    Ok(PathBuf::from(home).join(GLOBAL_STATE_DIR))
}

pub fn default_global_config_path() -> Result<PathBuf, ConfigError> {
    Ok(default_state_root()?.join(GLOBAL_SETTINGS_FILE_NAME))
}
