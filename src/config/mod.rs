pub mod error;
pub mod load;
pub mod paths;
pub mod settings;

pub use error::ConfigError;
pub use load::{load_settings_from, save_settings};
pub use paths::{
    default_global_config_path, default_state_root, GLOBAL_SETTINGS_FILE_NAME, GLOBAL_STATE_DIR,
    STATE_ROOT_ENV,
};
pub use settings::{
    ChunkingConfig, ClientConfig, EmbeddingConfig, ServerConfig, Settings, API_BASE_ENV,
    API_KEY_ENV, DEFAULT_MAX_TOKENS_PER_CHUNK, DEFAULT_OVERLAP_TOKENS,
};
