//! Error handling and custom error types
//!
//! Provides unified error handling across the crate using thiserror.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Encoding error: {0}")]
    Encode(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] dotenvy::Error),

    #[error("Invariant violated: {0}")]
    Invariant(String),
}

impl Error {
    /// True for failures raised by the underlying decoder or encoder.
    pub fn is_codec(&self) -> bool {
        matches!(self, Error::Image(_) | Error::Encode(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
