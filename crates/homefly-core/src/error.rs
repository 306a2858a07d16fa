// ── Core error types ──
//
// User-facing errors from homefly-core. Read-path failures (discovery,
// refresh) never surface here — they degrade to warnings and absent
// entities. Write-path failures are precise: the caller needs to know
// whether real-world state changed.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Caller input errors ──────────────────────────────────────────
    #[error("Entity not found: {id}")]
    EntityNotFound { id: String },

    #[error("Entity {id} does not support {capability}")]
    UnsupportedCapability { id: String, capability: &'static str },

    #[error("Invalid patch: {message}")]
    InvalidPatch { message: String },

    // ── Write-path errors ────────────────────────────────────────────
    #[error("No reachable endpoint for bridge {endpoint}")]
    EndpointUnavailable { endpoint: String },

    /// Protocol-level failure, surfaced unchanged from the API layer.
    #[error(transparent)]
    Api(#[from] homefly_api::Error),

    // ── Durable state ────────────────────────────────────────────────
    #[error("State persistence failed: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("Scheduling failed: {message}")]
    Scheduling { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}
