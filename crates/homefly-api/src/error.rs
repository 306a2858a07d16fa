use thiserror::Error;

use crate::types::WriteStatus;

/// Top-level error type for the `homefly-api` crate.
///
/// Covers every failure mode of the two wire operations: transport,
/// non-2xx responses, malformed bodies, and partial batch-write failures.
/// `homefly-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, timeout, DNS failure).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Protocol ────────────────────────────────────────────────────
    /// The bridge answered with an unexpected HTTP status.
    #[error("Bridge returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// A 2xx response whose body is not the expected accessory graph
    /// shape (object with an array-typed `accessories` field).
    #[error("Malformed bridge response: {message}")]
    MalformedResponse { message: String, body: String },

    /// A 207 multi-status write where at least one entry carried a
    /// non-zero status code. The whole batch is considered failed.
    #[error("{} of {total} characteristic writes failed", failures.len())]
    WriteFailed {
        failures: Vec<WriteStatus>,
        total: usize,
    },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying
    /// at a higher layer (this crate never retries itself).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
