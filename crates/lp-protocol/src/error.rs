//! Protocol error types

use thiserror::Error;

/// Errors that can occur while encoding or decoding events
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Event exceeds the maximum frame size
    #[error("Event too large: {size} bytes exceeds maximum of {max} bytes")]
    EventTooLarge { size: usize, max: usize },

    /// Malformed JSON or unknown event name
    #[error("Malformed event: {0}")]
    Malformed(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
