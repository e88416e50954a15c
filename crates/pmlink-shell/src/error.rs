use thiserror::Error;

/// Top-level error type for the `pmlink-shell` crate.
///
/// Covers every failure mode of the shell link: connecting to a bridge,
/// reading and writing the byte stream, and using a link after it closed.
/// `pmlink-core` maps these into engine-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection ──────────────────────────────────────────────────
    /// The bridge refused the connection, DNS failed, etc.
    #[error("Connection to {endpoint} failed: {reason}")]
    Connect { endpoint: String, reason: String },

    /// The connection attempt did not complete in time.
    #[error("Connection to {endpoint} timed out after {timeout_secs}s")]
    Timeout { endpoint: String, timeout_secs: u64 },

    /// Endpoint URL could not be parsed.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// Endpoint URL uses a scheme this crate has no adapter for.
    #[error("Unsupported endpoint scheme '{scheme}' (expected tcp://host:port)")]
    UnsupportedScheme { scheme: String },

    // ── Stream ──────────────────────────────────────────────────────
    /// Read or write failure on the underlying byte stream.
    #[error("Shell I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The other side of the link has gone away.
    #[error("Shell link closed")]
    LinkClosed,
}

impl Error {
    /// Returns `true` if reconnecting might resolve this error.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connect { .. } | Self::Timeout { .. } | Self::LinkClosed => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::TimedOut
            ),
            Self::InvalidEndpoint(_) | Self::UnsupportedScheme { .. } => false,
        }
    }
}
