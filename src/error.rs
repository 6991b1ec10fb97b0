use std::path::PathBuf;
use thiserror::Error;

/// The URL does not match any recognized post/reel/tv/story shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to extract short code from URL '{url}'")]
pub struct ExtractError {
    pub url: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Failed to convert short code to media id: short code is empty")]
    Empty,

    #[error("Failed to convert short code to media id: invalid character '{ch}' at position {position}")]
    InvalidCharacter { ch: char, position: usize },

    #[error("Failed to convert short code to media id: '{short_code}' overflows 64 bits")]
    Overflow { short_code: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Failure reported by the scraping session for a single call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Fetching Post metadata failed.")]
    NotFound,

    #[error("{0}")]
    Failed(String),
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to deactivate {target}: {message}")]
    Deactivate { target: String, message: String },

    #[error("Failed to upload {key}: {message}")]
    Upload { key: String, message: String },

    #[error("Failed to render output document: {0}")]
    Render(#[from] serde_json::Error),

    #[error("Failed to write local copy to {path}: {source}")]
    LocalCopy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Login failed: {0}")]
    Login(String),

    #[error("API error: {message}")]
    Api { message: String },

    #[error(transparent)]
    Sink(#[from] SinkError),
}

pub type Result<T> = std::result::Result<T, ScraperError>;
