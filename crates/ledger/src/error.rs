//! Error types for the chronicle ledger.

use std::io;

use snafu::Snafu;

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during ledger operations.
#[derive(Debug, Snafu)]
pub enum Error {
    /// Invalid construction parameters.
    #[snafu(display("invalid ledger configuration: {message}"))]
    Config {
        /// Description of the rejected parameter.
        message: String,
    },

    /// I/O error from the underlying file system.
    #[snafu(display("I/O error: {source}"))]
    Io {
        /// The underlying I/O error.
        source: io::Error,
    },

    /// On-disk data is corrupt: a bad file header, a bad frame, an
    /// unparseable file name, or an inconsistent directory layout.
    #[snafu(display("malformed ledger data: {reason}"))]
    Malformed {
        /// Description of what was malformed.
        reason: String,
    },

    /// An index fell outside the range held by a chunk.
    #[snafu(display("index {idx} outside chunk range [{start_idx}, {last_idx}]"))]
    OutOfRange {
        /// The requested index.
        idx: u64,
        /// First index held by the chunk.
        start_idx: u64,
        /// Last index held by the chunk.
        last_idx: u64,
    },
}

// Automatic conversion from io::Error for ergonomic ? usage
impl From<io::Error> for Error {
    fn from(source: io::Error) -> Self {
        Error::Io { source }
    }
}

impl From<chronicle_types::FrameError> for Error {
    fn from(source: chronicle_types::FrameError) -> Self {
        Error::Malformed { reason: source.to_string() }
    }
}
