//! Error types shared by every decoder.
//!
//! Decoders report failures through a single [`Error`] enum. Each variant maps
//! to a stable [`ErrorKind`] so callers can branch on the class of failure
//! without matching message strings.

use std::fmt;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable classification of decode failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input is not the format the decoder expected, or is structurally broken.
    InvalidFormat,
    /// The format is recognized but the file's version is not handled.
    UnsupportedVersion,
    /// A compression or encoding variant the decoder does not handle.
    UnsupportedEncoding,
    /// A bit depth or channel layout the decoder does not handle.
    UnsupportedBitDepth,
    /// Image dimensions exceed the configured limits.
    DimensionsExceeded,
    /// Input ended before the decoder could finish.
    TruncatedData,
    /// An underlying I/O operation failed.
    Io,
    /// An internal invariant failed (surface allocation, conversion).
    Internal,
}

/// Decode error with a human-readable detail message.
#[derive(Debug)]
pub enum Error {
    InvalidFormat(String),
    UnsupportedVersion(String),
    UnsupportedEncoding(String),
    UnsupportedBitDepth(String),
    DimensionsExceeded {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },
    TruncatedData(String),
    Io(std::io::Error),
    Internal(String),
}

impl Error {
    /// The stable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidFormat(_) => ErrorKind::InvalidFormat,
            Error::UnsupportedVersion(_) => ErrorKind::UnsupportedVersion,
            Error::UnsupportedEncoding(_) => ErrorKind::UnsupportedEncoding,
            Error::UnsupportedBitDepth(_) => ErrorKind::UnsupportedBitDepth,
            Error::DimensionsExceeded { .. } => ErrorKind::DimensionsExceeded,
            Error::TruncatedData(_) => ErrorKind::TruncatedData,
            Error::Io(_) => ErrorKind::Io,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidFormat(msg) => write!(f, "invalid format: {msg}"),
            Error::UnsupportedVersion(msg) => write!(f, "unsupported version: {msg}"),
            Error::UnsupportedEncoding(msg) => write!(f, "unsupported encoding: {msg}"),
            Error::UnsupportedBitDepth(msg) => write!(f, "unsupported bit depth: {msg}"),
            Error::DimensionsExceeded {
                width,
                height,
                max_width,
                max_height,
            } => write!(
                f,
                "image dimensions {width}x{height} exceed limits {max_width}x{max_height}"
            ),
            Error::TruncatedData(msg) => write!(f, "truncated data: {msg}"),
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
