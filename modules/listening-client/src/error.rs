use thiserror::Error;

pub type Result<T> = std::result::Result<T, ListeningError>;

#[derive(Debug, Error)]
pub enum ListeningError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl ListeningError {
    /// Explicit rate-limit signal from the provider.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ListeningError::Api { status: 429, .. })
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, ListeningError::Api { status: 403, .. })
    }
}

impl From<reqwest::Error> for ListeningError {
    fn from(err: reqwest::Error) -> Self {
        ListeningError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ListeningError {
    fn from(err: serde_json::Error) -> Self {
        ListeningError::Parse(err.to_string())
    }
}
