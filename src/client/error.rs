use super::messages::{resolve_message, NETWORK_ERROR};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("service returned {status} ({}): {}", code.as_deref().unwrap_or("-"), resolve_message(detail.as_deref(), code.as_deref(), message.as_deref()))]
    Api {
        status: u16,
        code: Option<String>,
        message: Option<String>,
        detail: Option<String>,
    },
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("downloaded file checksum {actual} does not match {expected}")]
    Integrity { expected: String, actual: String },
}

impl ClientError {
    /// Text for the person at the terminal.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport { .. } => NETWORK_ERROR.to_string(),
            Self::Api {
                code,
                message,
                detail,
                ..
            } => resolve_message(detail.as_deref(), code.as_deref(), message.as_deref()),
            other => other.to_string(),
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Failures worth retrying on the next poll.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Decode { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Io { .. } | Self::Integrity { .. } => false,
        }
    }
}
