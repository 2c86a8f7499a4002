use std::io;
use thiserror::Error;

/// The primary error type for the `loxlegacy-lib` crate.
///
/// Protocol handlers never surface errors; this type covers the edges around
/// them (parsing, configuration, the actor channel, fragment requests).
#[derive(Error, Debug)]
pub enum LegacyError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid frame length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("Fragmented payload of {len} bytes exceeds the 16-bit length field")]
    PayloadTooLarge { len: usize },

    #[error("Fragmented transfer refused while the extension is offline")]
    NotOnline,

    #[error("Extension event loop is no longer running")]
    ChannelClosed,
}
