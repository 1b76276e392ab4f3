//! Error types for the lip-sync driver.
//!
//! Only the edges of the crate return these: loading config, decoding clips,
//! opening audio devices and building the spectrum analyzer. Once a session
//! is running, failures are logged and degrade to a closed mouth instead.

/// Top-level error type for the lip-sync driver.
#[derive(Debug, thiserror::Error)]
pub enum LipSyncError {
    /// Audio device or stream error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Audio file could not be probed or decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Spectrum analyzer could not be constructed.
    #[error("analysis error: {0}")]
    Analysis(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// A name did not match any known viseme or emotion.
    #[error("unknown {kind}: {value}")]
    UnknownName {
        /// What was being parsed ("viseme", "emotion").
        kind: &'static str,
        /// The rejected input.
        value: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, LipSyncError>;
