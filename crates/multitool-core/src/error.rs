//! Error types for the multi-tool core

use thiserror::Error;

/// Result type alias using the core Error
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Validation errors, raised before any network call
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported image type '{0}'. Use a PNG, JPEG, WEBP, HEIC or HEIF image.")]
    UnsupportedImage(String),

    #[error("Image data is not valid base64: {0}")]
    InvalidImage(String),

    #[error("Gemini API key not configured. Set GEMINI_API_KEY or press 'K' to enter one.")]
    ApiKeyMissing,

    // Provider errors
    #[error("Network error: {0}. Check your internet connection.")]
    NetworkError(#[from] reqwest::Error),

    #[error("Gemini API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Request blocked by Gemini: {0}")]
    Blocked(String),

    #[error("Unexpected response from Gemini: {0}")]
    InvalidResponse(String),

    // Local errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for errors caught before any request reaches the provider.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_)
                | Error::UnsupportedImage(_)
                | Error::InvalidImage(_)
                | Error::ApiKeyMissing
        )
    }
}
