//! Command-line surface: clap derive definitions only. Behavior lives
//! in `commands`.

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "homefly",
    version,
    about = "Control smart-home bridge endpoints from the command line",
    long_about = "Discovers local Homebridge-style bridge endpoints, lists their \
                  controllable entities, flips them now or on a durable schedule, \
                  and runs allowlisted remediation commands behind a guardrail."
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Path to the bridge host configuration (config.json)
    #[arg(long, global = true, env = "HOMEFLY_BRIDGE_CONFIG")]
    pub bridge_config: Option<std::path::PathBuf>,

    /// Path to the bridge credential store (persist directory)
    #[arg(long, global = true, env = "HOMEFLY_PERSIST_DIR")]
    pub persist_dir: Option<std::path::PathBuf>,

    /// Address the bridges listen on
    #[arg(long, global = true, env = "HOMEFLY_HOST")]
    pub host: Option<String>,

    /// Path to the durable state file
    #[arg(long, global = true, env = "HOMEFLY_STATE_PATH")]
    pub state_path: Option<std::path::PathBuf>,

    /// Per-request HTTP timeout in seconds
    #[arg(long, global = true, env = "HOMEFLY_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(long, short = 'o', global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Browse and control entities
    Entities(EntitiesArgs),

    /// Manage durable one-shot scheduled actions
    Schedule(ScheduleArgs),

    /// Run allowlisted remediation commands behind the guardrail
    Guard(GuardArgs),

    /// Run the long-lived service: periodic refresh plus the scheduler
    Serve,

    /// Inspect or initialize the homefly configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── entities ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct EntitiesArgs {
    #[command(subcommand)]
    pub command: EntitiesCommand,
}

#[derive(Debug, Subcommand)]
pub enum EntitiesCommand {
    /// List entities across all endpoints
    List {
        /// Case-insensitive substring filter on name or id
        #[arg(long, short = 'q')]
        query: Option<String>,
    },

    /// Show one entity
    Get {
        /// Entity id (endpoint:aid:service-iid)
        id: String,
    },

    /// Change an entity's power and/or brightness
    Set {
        /// Entity id (endpoint:aid:service-iid)
        id: String,

        /// Turn the entity on
        #[arg(long, conflicts_with = "off")]
        on: bool,

        /// Turn the entity off
        #[arg(long)]
        off: bool,

        /// Brightness percentage (lights only, clamped to 0-100)
        #[arg(long, short = 'b')]
        brightness: Option<f64>,
    },
}

// ── schedule ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ScheduleArgs {
    #[command(subcommand)]
    pub command: ScheduleCommand,
}

#[derive(Debug, Subcommand)]
pub enum ScheduleCommand {
    /// List pending actions
    List,

    /// Schedule an entity state change
    Set {
        /// Entity id (endpoint:aid:service-iid)
        id: String,

        /// Turn the entity on
        #[arg(long, conflicts_with = "off")]
        on: bool,

        /// Turn the entity off
        #[arg(long)]
        off: bool,

        /// Brightness percentage (lights only)
        #[arg(long, short = 'b')]
        brightness: Option<f64>,

        #[command(flatten)]
        when: WhenArgs,
    },

    /// Schedule a host restart
    Restart {
        /// Reason recorded with the restart
        #[arg(long, default_value = "scheduled restart")]
        reason: String,

        #[command(flatten)]
        when: WhenArgs,
    },

    /// Cancel a pending action
    Cancel {
        /// Action id
        id: String,
    },
}

/// When a scheduled action fires: a relative delay or an absolute time.
#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct WhenArgs {
    /// Delay from now (e.g. "90s", "2h 30m")
    #[arg(long = "in", value_name = "DURATION")]
    pub delay: Option<String>,

    /// Absolute RFC 3339 time (e.g. "2026-08-25T07:30:00Z")
    #[arg(long = "at", value_name = "TIME")]
    pub at: Option<String>,
}

// ── guard ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GuardArgs {
    #[command(subcommand)]
    pub command: GuardCommand,
}

#[derive(Debug, Subcommand)]
pub enum GuardCommand {
    /// Show the allowlist and current ledger state
    List,

    /// Propose one or more remediation commands, in order
    Run {
        /// Allowlisted command ids
        #[arg(required = true)]
        ids: Vec<String>,

        /// Reason recorded with the proposals
        #[arg(long, default_value = "manual invocation")]
        reason: String,
    },
}

// ── config ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the resolved configuration
    Show,

    /// Write a starter configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the configuration file path
    Path,
}

// ── completions ─────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
