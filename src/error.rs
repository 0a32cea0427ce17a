use thiserror::Error;

/// Unified error type for asm-info operations
#[derive(Error, Debug)]
pub enum AsmInfoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bad image format: {0}")]
    BadImage(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience type alias for Results in asm-info
pub type Result<T> = std::result::Result<T, AsmInfoError>;

impl AsmInfoError {
    /// Create a bad image error with context
    pub fn bad_image(msg: impl Into<String>) -> Self {
        AsmInfoError::BadImage(msg.into())
    }

    /// Create a metadata error with context
    pub fn metadata(msg: impl Into<String>) -> Self {
        AsmInfoError::Metadata(msg.into())
    }

    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        AsmInfoError::Config(msg.into())
    }
}
