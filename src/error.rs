// Error types for the transfer pipeline.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Which byte stream a read failure happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// The local file being encoded into the request body.
    Source,
    /// The body of the server response.
    Response,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Source => f.write_str("source file"),
            Stream::Response => f.write_str("response body"),
        }
    }
}

/// Terminal failures of a transfer. None of them is retried.
///
/// A non-2xx HTTP status is not represented here: the server answered,
/// so the exchange succeeded and the status is carried by
/// [`TransferResult`](crate::TransferResult).
#[derive(Error, Debug)]
pub enum TransferError {
    /// The request parameters were empty or unusable.
    #[error("Invalid transfer request: {0}")]
    InvalidRequest(String),

    /// Source file missing, unreadable, or its metadata unavailable.
    #[error("Cannot access {}: {source}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The multipart body could not be constructed.
    #[error("Cannot encode multipart body: {0}")]
    Encoding(#[from] crate::multipart::EncodeError),

    /// A byte stream ended unexpectedly or faulted mid-transfer.
    #[error("Failed reading {stream}: {source}")]
    Read {
        stream: Stream,
        #[source]
        source: io::Error,
    },

    /// The request could not be sent, or timed out.
    #[error("Request to {url} failed")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl TransferError {
    pub fn file_access(path: impl Into<PathBuf>, source: io::Error) -> Self {
        TransferError::FileAccess {
            path: path.into(),
            source,
        }
    }

    pub fn read(stream: Stream, source: io::Error) -> Self {
        TransferError::Read { stream, source }
    }

    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        TransferError::Network {
            url: url.into(),
            source,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for transfer operations.
pub type Result<T> = std::result::Result<T, TransferError>;
