//! # Error Types
//!
//! Custom error types for JJRC Link using `thiserror`.

use thiserror::Error;

/// Main error type for JJRC Link
#[derive(Debug, Error)]
pub enum LinkError {
    /// A channel to the aircraft could not be opened
    #[error("Setup error: {0}")]
    Setup(String),

    /// A single outbound write failed
    #[error("Transport write error: {0}")]
    TransportWrite(String),

    /// A frame unit could not be decoded downstream
    #[error("Decode error: {0}")]
    Decode(String),

    /// Unrecovered failure in the analysis/display path
    #[error("Analysis fault: {0}")]
    AnalysisFault(String),

    /// Send attempted after the landing sequence closed the session
    #[error("Command session is closed")]
    SessionClosed,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LinkError {
    /// Whether the error is local to a single tick or frame unit.
    ///
    /// Recoverable errors are logged and absorbed; everything else ends the
    /// path that raised it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LinkError::TransportWrite(_) | LinkError::Decode(_))
    }
}

/// Result type alias for JJRC Link
pub type Result<T> = std::result::Result<T, LinkError>;
