use thiserror::Error;

/// Bridge-wide error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid version: {0}")]
    Version(#[from] semver::Error),

    #[error("Invalid asset pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Checksum mismatch for {0}")]
    Checksum(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Config error: {0}")]
    Config(String),
}

/// Convenience Result type using our Error
pub type Result<T> = std::result::Result<T, Error>;
