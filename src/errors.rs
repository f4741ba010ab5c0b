use std::io;

/// Result type with [`Error`] as the default error
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned by setup and initialization entry points
///
/// Runtime queries never return errors; they answer with sentinel values
/// (`-1`, [`NONE`](crate::NONE), empty strings or `None`) instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unrecoverable configuration error
    ///
    /// Raised for negative feature domain sizes, inconsistent feature type
    /// registration, unresolvable inputs and unknown names. The extractor or
    /// transition system that produced it must not be used.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed feature template or task configuration text
    #[error("parse error at offset {position}: {message}")]
    Parse { position: usize, message: String },

    /// Malformed vocabulary file
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// Underlying I/O error
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn invalid_format<S: Into<String>>(msg: S) -> Self {
        Self::InvalidFormat(msg.into())
    }

    /// Whether this error is an unrecoverable configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Parse { .. })
    }
}
