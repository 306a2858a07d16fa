//! CLI-owned configuration: the TOML file, environment overrides, and
//! translation to `homefly_core::CoreConfig`.
//!
//! Core never sees these types — it receives a pre-built `CoreConfig`.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use homefly_core::{CoreConfig, GuardrailConfig, RemediationCommand};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── TOML config structs ──────────────────────────────────────────────

/// CLI-owned TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Path to the bridge host configuration (config.json).
    #[serde(default = "default_bridge_config")]
    pub bridge_config: PathBuf,

    /// Path to the bridge credential store.
    #[serde(default = "default_persist_dir")]
    pub persist_dir: PathBuf,

    /// Address the bridges listen on.
    #[serde(default = "default_host")]
    pub host: String,

    /// Durable state file for scheduled actions and the guardrail ledger.
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Registry self-refresh interval in seconds (serve mode). 0 = never.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,

    #[serde(default)]
    pub guardrail: Guardrail,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bridge_config: default_bridge_config(),
            persist_dir: default_persist_dir(),
            host: default_host(),
            state_path: default_state_path(),
            timeout: default_timeout(),
            refresh_interval: default_refresh_interval(),
            guardrail: Guardrail::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Guardrail {
    /// Hard cap on remediation executions per calendar date.
    #[serde(default = "default_daily_cap")]
    pub daily_cap: u32,

    /// Wall-clock timeout per command execution, in seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout: u64,

    /// Allowlisted remediation commands.
    #[serde(default)]
    pub commands: Vec<GuardCommand>,
}

impl Default for Guardrail {
    fn default() -> Self {
        Self {
            daily_cap: default_daily_cap(),
            command_timeout: default_command_timeout(),
            commands: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GuardCommand {
    pub id: String,
    pub label: String,
    /// Shell command line, run via `sh -c`.
    pub shell: String,
    /// Minutes between executions of this command.
    #[serde(default = "default_cooldown")]
    pub cooldown: i64,
}

fn default_bridge_config() -> PathBuf {
    PathBuf::from("/var/lib/homebridge/config.json")
}
fn default_persist_dir() -> PathBuf {
    PathBuf::from("/var/lib/homebridge/persist")
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_state_path() -> PathBuf {
    PathBuf::from("/var/lib/homefly/state.json")
}
fn default_timeout() -> u64 {
    10
}
fn default_refresh_interval() -> u64 {
    300
}
fn default_daily_cap() -> u32 {
    10
}
fn default_command_timeout() -> u64 {
    60
}
fn default_cooldown() -> i64 {
    30
}

// ── Config file path ─────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "homefly", "homefly")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("homefly");
            p.push("config.toml");
            p
        })
}

// ── Config loading ───────────────────────────────────────────────────

/// Load the configuration from file + environment.
pub fn load_config() -> Result<Config, CliError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(config_path()))
        .merge(Env::prefixed("HOMEFLY_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Translate the file config plus global flags into a `CoreConfig`.
///
/// This is the single boundary where CLI config types cross into core
/// types. Flags win over the file; the file wins over defaults.
pub fn build_core_config(global: &GlobalOpts) -> Result<CoreConfig, CliError> {
    let cfg = load_config()?;

    let guardrail = GuardrailConfig {
        commands: cfg
            .guardrail
            .commands
            .iter()
            .map(|c| RemediationCommand {
                id: c.id.clone(),
                label: c.label.clone(),
                shell: c.shell.clone(),
                cooldown_minutes: c.cooldown,
            })
            .collect(),
        daily_cap: cfg.guardrail.daily_cap,
        command_timeout: Duration::from_secs(cfg.guardrail.command_timeout),
        ..GuardrailConfig::default()
    };

    Ok(CoreConfig {
        config_path: global
            .bridge_config
            .clone()
            .unwrap_or(cfg.bridge_config),
        persist_dir: global.persist_dir.clone().unwrap_or(cfg.persist_dir),
        bridge_host: global.host.clone().unwrap_or(cfg.host),
        state_path: global.state_path.clone().unwrap_or(cfg.state_path),
        timeout: Duration::from_secs(global.timeout.unwrap_or(cfg.timeout)),
        refresh_interval_secs: cfg.refresh_interval,
        guardrail,
    })
}

// ── Starter file ─────────────────────────────────────────────────────

/// Template written by `homefly config init`.
pub const STARTER_CONFIG: &str = r#"# homefly configuration

# Where the bridge host keeps its config.json and credential store.
bridge_config = "/var/lib/homebridge/config.json"
persist_dir = "/var/lib/homebridge/persist"

# Address the bridges listen on. They only speak local HTTP.
host = "127.0.0.1"

# Durable state: scheduled actions and the guardrail ledger.
state_path = "/var/lib/homefly/state.json"

# Per-request HTTP timeout (seconds).
timeout = 10

# How often `homefly serve` refreshes the entity registry (seconds).
refresh_interval = 300

[guardrail]
daily_cap = 10
command_timeout = 60

# Allowlisted remediation commands. Only these ids can be run through
# `homefly guard run`.
#
# [[guardrail.commands]]
# id = "restart_bridge"
# label = "Restart the bridge service"
# shell = "sudo systemctl restart homebridge"
# cooldown = 30
"#;
