//! Error types for container parsing, writing and audio conversion.

use thiserror::Error;

use crate::audio::AudioFormat;

/// Result type alias for hx operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for hx operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the host file callbacks.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid argument (empty filename, unrecognized file extension, ...).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid index table magic number.
    #[error("Invalid index header: expected 0x{expected:08X}, got 0x{actual:08X}")]
    InvalidHeader { expected: u32, actual: u32 },

    /// Index type was neither 1 nor 2.
    #[error("Invalid index type: {0}")]
    InvalidIndexType(u32),

    /// The index reports zero entries.
    #[error("File contains no entries")]
    EmptyFile,

    /// The entry body header disagrees with the index record.
    #[error("Entry header does not match index: {0}")]
    HeaderMismatch(String),

    /// A class name that is not in the registry.
    #[error("Unknown class \"{0}\"")]
    UnknownClass(String),

    /// A PSX-ADPCM frame with an out-of-range predictor.
    #[error("Malformed PSX-ADPCM frame: predictor {predictor} > 4")]
    MalformedFrame { predictor: u8 },

    /// No codec path between the two formats.
    #[error("Unsupported audio conversion: {from:?} -> {to:?}")]
    UnsupportedConversion { from: AudioFormat, to: AudioFormat },

    /// RIFF/WAVE/fmt magic mismatch or bad format code.
    #[error("Invalid wave header: {0}")]
    WaveHeaderInvalid(String),

    /// Stream cursor ran past the end of the buffer.
    #[error("Unexpected end of data")]
    UnexpectedEof,
}
