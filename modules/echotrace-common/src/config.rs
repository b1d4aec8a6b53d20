use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres (post + job stores)
    pub database_url: String,

    // Remote collection API
    pub listening_api_token: String,
    pub listening_base_url: Option<String>,

    // Object storage roots
    pub payload_store_path: String,
    pub lake_store_path: String,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            listening_api_token: required_env("LISTENING_API_TOKEN"),
            listening_base_url: env::var("LISTENING_BASE_URL").ok(),
            payload_store_path: required_env("PAYLOAD_STORE_PATH"),
            lake_store_path: required_env("LAKE_STORE_PATH"),
        }
    }

    /// Minimal config for merge-only invocations (no API token needed).
    pub fn merge_from_env() -> Self {
        Self {
            database_url: String::new(),
            listening_api_token: String::new(),
            listening_base_url: None,
            payload_store_path: required_env("PAYLOAD_STORE_PATH"),
            lake_store_path: required_env("LAKE_STORE_PATH"),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
