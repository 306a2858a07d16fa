// ── Runtime configuration ──
//
// Describes where the host bridge configuration lives and how the core
// components behave. Built by the CLI from its config file and flags,
// passed in by value — core never reads its own config files.

use std::path::PathBuf;
use std::time::Duration;

use crate::guardrail::GuardrailConfig;

/// Configuration for the core components.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Path to the host bridge configuration (Homebridge `config.json`).
    pub config_path: PathBuf,
    /// Persisted credential store directory (`persist/` next to the
    /// bridge config by convention).
    pub persist_dir: PathBuf,
    /// Address bridges listen on. They only speak local HTTP.
    pub bridge_host: String,
    /// Durable state file holding scheduled actions and the guardrail
    /// ledger.
    pub state_path: PathBuf,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// How often the registry refreshes itself (seconds). 0 = never.
    pub refresh_interval_secs: u64,
    /// Guardrail allowlist and limits.
    pub guardrail: GuardrailConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("/var/lib/homebridge/config.json"),
            persist_dir: PathBuf::from("/var/lib/homebridge/persist"),
            bridge_host: "127.0.0.1".into(),
            state_path: PathBuf::from("/var/lib/homefly/state.json"),
            timeout: Duration::from_secs(10),
            refresh_interval_secs: 300,
            guardrail: GuardrailConfig::default(),
        }
    }
}
