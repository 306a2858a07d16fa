//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable
//! help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use homefly_core::CoreError;

/// Exit codes for process termination.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const GUARDED: i32 = 5;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Entities ─────────────────────────────────────────────────────

    #[error("Entity '{id}' not found")]
    #[diagnostic(
        code(homefly::entity_not_found),
        help(
            "Run: homefly entities list\n\
             Entity ids have the form endpoint:aid:service-iid."
        )
    )]
    EntityNotFound { id: String },

    #[error("Entity '{id}' does not support {capability}")]
    #[diagnostic(
        code(homefly::unsupported_capability),
        help("Only lights with a writable brightness characteristic accept --brightness.")
    )]
    UnsupportedCapability {
        id: String,
        capability: &'static str,
    },

    // ── Bridge connection ────────────────────────────────────────────

    #[error("Endpoint '{endpoint}' is unavailable")]
    #[diagnostic(
        code(homefly::endpoint_unavailable),
        help(
            "The bridge did not answer during the last refresh.\n\
             Check that it is running, then retry."
        )
    )]
    EndpointUnavailable { endpoint: String },

    #[error("Bridge rejected the request ({status})")]
    #[diagnostic(
        code(homefly::bridge_rejected),
        help(
            "A 401/470 usually means the bridge PIN is wrong or insecure mode is disabled.\n\
             Verify the pin in the bridge configuration."
        )
    )]
    BridgeRejected { status: u16, body: String },

    #[error(transparent)]
    #[diagnostic(code(homefly::protocol))]
    Protocol(homefly_api::Error),

    // ── Scheduling ───────────────────────────────────────────────────

    #[error("Scheduled action '{id}' not found")]
    #[diagnostic(
        code(homefly::action_not_found),
        help("Run: homefly schedule list")
    )]
    ActionNotFound { id: String },

    // ── Guardrail ────────────────────────────────────────────────────

    #[error("Remediation command '{id}' is not allowlisted")]
    #[diagnostic(
        code(homefly::not_allowlisted),
        help(
            "Only commands declared under [[guardrail.commands]] in the\n\
             configuration file can be run. See: homefly guard list"
        )
    )]
    NotAllowlisted { id: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(homefly::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(
        code(homefly::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(homefly::config))]
    Config(Box<figment::Error>),

    // ── IO / fallthrough ─────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    #[diagnostic(code(homefly::internal))]
    Internal(String),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::EntityNotFound { .. } | Self::ActionNotFound { .. } => exit_code::NOT_FOUND,
            Self::EndpointUnavailable { .. } | Self::Protocol(_) => exit_code::CONNECTION,
            Self::BridgeRejected { .. } => exit_code::AUTH,
            Self::NotAllowlisted { .. } => exit_code::GUARDED,
            Self::Validation { .. } | Self::UnsupportedCapability { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::EntityNotFound { id } => CliError::EntityNotFound { id },

            CoreError::UnsupportedCapability { id, capability } => {
                CliError::UnsupportedCapability { id, capability }
            }

            CoreError::InvalidPatch { message } => CliError::Validation {
                field: "patch".into(),
                reason: message,
            },

            CoreError::EndpointUnavailable { endpoint } => {
                CliError::EndpointUnavailable { endpoint }
            }

            CoreError::Api(api) => match api {
                homefly_api::Error::Http { status, body } if status == 401 || status == 470 => {
                    CliError::BridgeRejected { status, body }
                }
                other => CliError::Protocol(other),
            },

            CoreError::Persistence(io) => CliError::Io(io),

            CoreError::Scheduling { message } => CliError::Validation {
                field: "schedule".into(),
                reason: message,
            },

            CoreError::Config { message } => CliError::Internal(message),

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}
