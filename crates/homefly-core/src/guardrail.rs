// ── Guardrail engine ──
//
// Gate in front of automatically-triggered remediation commands:
// allowlist, per-command cooldown, and a rolling daily quota. The daily
// quota is a circuit breaker — once tripped, the rest of the proposal
// batch is reported skipped without being evaluated.
//
// Every outcome becomes a human-readable line; callers aggregate those
// into a single response.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::store::StateStore;

// ── Configuration ───────────────────────────────────────────────────

/// One allowlisted remediation command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationCommand {
    pub id: String,
    pub label: String,
    /// Shell command line, executed via `sh -c`.
    pub shell: String,
    pub cooldown_minutes: i64,
}

/// Guardrail allowlist and limits.
#[derive(Debug, Clone)]
pub struct GuardrailConfig {
    pub commands: Vec<RemediationCommand>,
    /// Hard cap on executions per calendar date, across all commands.
    pub daily_cap: u32,
    /// Wall-clock timeout per command execution.
    pub command_timeout: Duration,
    /// Combined stdout+stderr cap for reporting.
    pub max_output_bytes: usize,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            daily_cap: 10,
            command_timeout: Duration::from_secs(60),
            max_output_bytes: 16 * 1024,
        }
    }
}

// ── Ledger ──────────────────────────────────────────────────────────

/// Rolling daily execution counter. Fully reset the first time a new
/// calendar date is observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyQuota {
    pub date: NaiveDate,
    pub count: u32,
}

impl Default for DailyQuota {
    fn default() -> Self {
        Self {
            date: NaiveDate::MIN,
            count: 0,
        }
    }
}

/// Durable guardrail state: per-command last-run timestamps plus the
/// daily counter. Mutated only by the engine, persisted with every
/// execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardrailLedger {
    #[serde(default)]
    pub cooldowns: HashMap<String, DateTime<Utc>>,
    #[serde(default)]
    pub daily: DailyQuota,
}

// ── Proposals & decisions ───────────────────────────────────────────

/// A remediation request from health analysis, the watchdog, or a
/// manual invocation.
#[derive(Debug, Clone)]
pub struct Proposal {
    pub command_id: String,
    pub reason: String,
}

enum Decision<'a> {
    Execute(&'a RemediationCommand),
    SkipUnknown,
    SkipCooldown {
        command: &'a RemediationCommand,
        remaining_minutes: i64,
    },
    SkipQuota,
}

/// Evaluate one proposal against the ledger without executing anything.
///
/// Order matters: date rollover reset, then the quota circuit breaker,
/// then the allowlist, then the cooldown.
fn evaluate<'a>(
    ledger: &mut GuardrailLedger,
    config: &'a GuardrailConfig,
    command_id: &str,
    now: DateTime<Utc>,
) -> Decision<'a> {
    let today = now.date_naive();
    if ledger.daily.date != today {
        ledger.daily = DailyQuota {
            date: today,
            count: 0,
        };
    }

    if ledger.daily.count >= config.daily_cap {
        return Decision::SkipQuota;
    }

    let Some(command) = config.commands.iter().find(|c| c.id == command_id) else {
        return Decision::SkipUnknown;
    };

    if let Some(last_run) = ledger.cooldowns.get(&command.id) {
        let elapsed = now - *last_run;
        if elapsed < TimeDelta::minutes(command.cooldown_minutes) {
            let remaining_minutes = command.cooldown_minutes - elapsed.num_minutes();
            return Decision::SkipCooldown {
                command,
                remaining_minutes,
            };
        }
    }

    Decision::Execute(command)
}

// ── Engine ──────────────────────────────────────────────────────────

/// The allowlist + cooldown + daily-quota gate.
pub struct Guardrail {
    config: GuardrailConfig,
    store: Arc<StateStore>,
}

impl Guardrail {
    pub fn new(config: GuardrailConfig, store: Arc<StateStore>) -> Self {
        Self { config, store }
    }

    /// Process a batch of proposals strictly in order, returning one
    /// report line per proposal.
    ///
    /// An execution attempt (success or failure) records the last-run
    /// timestamp and consumes a daily-quota slot; both are persisted
    /// before the line is reported.
    pub async fn process(&self, proposals: &[Proposal]) -> Vec<String> {
        let mut ledger = self.store.ledger().await;
        let mut lines = Vec::with_capacity(proposals.len());

        for (index, proposal) in proposals.iter().enumerate() {
            let now = Utc::now();
            match evaluate(&mut ledger, &self.config, &proposal.command_id, now) {
                Decision::SkipQuota => {
                    // Circuit breaker: the rest of the batch is not
                    // individually evaluated.
                    for rest in &proposals[index..] {
                        lines.push(format!(
                            "skipped {}: daily remediation quota reached",
                            rest.command_id
                        ));
                    }
                    break;
                }
                Decision::SkipUnknown => {
                    lines.push(format!(
                        "skipped {}: not in the remediation allowlist",
                        proposal.command_id
                    ));
                }
                Decision::SkipCooldown {
                    command,
                    remaining_minutes,
                } => {
                    lines.push(format!(
                        "skipped {}: cooldown ({remaining_minutes}m remaining)",
                        command.label
                    ));
                }
                Decision::Execute(command) => {
                    info!(command = %command.id, reason = %proposal.reason, "executing remediation command");
                    let line = run_shell(command, &self.config).await;

                    ledger.cooldowns.insert(command.id.clone(), now);
                    ledger.daily.count += 1;
                    if let Err(e) = self.store.set_ledger(ledger.clone()).await {
                        warn!(error = %e, "guardrail ledger persist failed");
                    }

                    lines.push(line);
                }
            }
        }

        // A date rollover may have reset the counter without any
        // execution; keep the stored ledger in step.
        if let Err(e) = self.store.set_ledger(ledger).await {
            warn!(error = %e, "guardrail ledger persist failed");
        }

        lines
    }
}

/// Execute an allowlisted shell command with a wall-clock timeout and a
/// capped, concatenated stdout+stderr report.
async fn run_shell(command: &RemediationCommand, config: &GuardrailConfig) -> String {
    let mut child = tokio::process::Command::new("sh");
    child
        .arg("-c")
        .arg(&command.shell)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    match tokio::time::timeout(config.command_timeout, child.output()).await {
        Err(_) => {
            warn!(command = %command.id, "remediation command timed out");
            format!(
                "{} failed: timed out after {}s",
                command.label,
                config.command_timeout.as_secs()
            )
        }
        Ok(Err(e)) => format!("{} failed: {e}", command.label),
        Ok(Ok(output)) => {
            let mut combined = output.stdout;
            combined.extend_from_slice(&output.stderr);
            combined.truncate(config.max_output_bytes);
            let text = String::from_utf8_lossy(&combined);
            let text = text.trim();

            if output.status.success() {
                if text.is_empty() {
                    format!("executed {}", command.label)
                } else {
                    format!("executed {}: {text}", command.label)
                }
            } else {
                format!("{} exited with {}: {text}", command.label, output.status)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config_with(commands: Vec<RemediationCommand>, daily_cap: u32) -> GuardrailConfig {
        GuardrailConfig {
            commands,
            daily_cap,
            ..GuardrailConfig::default()
        }
    }

    fn restart_command(cooldown_minutes: i64) -> RemediationCommand {
        RemediationCommand {
            id: "restart_bridge".into(),
            label: "restart bridge".into(),
            shell: "true".into(),
            cooldown_minutes,
        }
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 24, hour, minute, 0).unwrap()
    }

    #[test]
    fn cooldown_denies_then_allows() {
        let config = config_with(vec![restart_command(60)], 10);
        let mut ledger = GuardrailLedger::default();

        // First run at T executes and records the timestamp.
        assert!(matches!(
            evaluate(&mut ledger, &config, "restart_bridge", at(10, 0)),
            Decision::Execute(_)
        ));
        ledger.cooldowns.insert("restart_bridge".into(), at(10, 0));
        ledger.daily.count += 1;

        // T+30m: still cooling down.
        match evaluate(&mut ledger, &config, "restart_bridge", at(10, 30)) {
            Decision::SkipCooldown {
                remaining_minutes, ..
            } => assert_eq!(remaining_minutes, 30),
            _ => panic!("expected cooldown skip"),
        }

        // T+61m: allowed again.
        assert!(matches!(
            evaluate(&mut ledger, &config, "restart_bridge", at(11, 1)),
            Decision::Execute(_)
        ));
    }

    #[test]
    fn daily_quota_trips_even_without_cooldown_conflict() {
        let config = config_with(vec![restart_command(0)], 5);
        let mut ledger = GuardrailLedger {
            daily: DailyQuota {
                date: at(12, 0).date_naive(),
                count: 5,
            },
            ..GuardrailLedger::default()
        };

        assert!(matches!(
            evaluate(&mut ledger, &config, "restart_bridge", at(12, 0)),
            Decision::SkipQuota
        ));
    }

    #[test]
    fn date_rollover_resets_counter_before_evaluation() {
        let config = config_with(vec![restart_command(0)], 5);
        let mut ledger = GuardrailLedger {
            daily: DailyQuota {
                date: NaiveDate::from_ymd_opt(2026, 8, 23).unwrap(),
                count: 5,
            },
            ..GuardrailLedger::default()
        };

        // New day: the stored count no longer applies.
        assert!(matches!(
            evaluate(&mut ledger, &config, "restart_bridge", at(0, 1)),
            Decision::Execute(_)
        ));
        assert_eq!(ledger.daily.count, 0);
        assert_eq!(ledger.daily.date, at(0, 1).date_naive());
    }

    #[test]
    fn unknown_command_is_skipped() {
        let config = config_with(vec![restart_command(60)], 5);
        let mut ledger = GuardrailLedger::default();

        assert!(matches!(
            evaluate(&mut ledger, &config, "rm_everything", at(9, 0)),
            Decision::SkipUnknown
        ));
    }

    #[tokio::test]
    async fn process_executes_and_persists_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(StateStore::open(dir.path().join("state.json")).await);
        let config = config_with(
            vec![RemediationCommand {
                id: "echo".into(),
                label: "echo hello".into(),
                shell: "echo hello".into(),
                cooldown_minutes: 60,
            }],
            5,
        );
        let guardrail = Guardrail::new(config, Arc::clone(&store));

        let lines = guardrail
            .process(&[Proposal {
                command_id: "echo".into(),
                reason: "test".into(),
            }])
            .await;

        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("executed echo hello"), "got: {}", lines[0]);
        assert!(lines[0].contains("hello"));

        let ledger = store.ledger().await;
        assert_eq!(ledger.daily.count, 1);
        assert!(ledger.cooldowns.contains_key("echo"));
    }

    #[tokio::test]
    async fn process_circuit_breaks_remaining_batch() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(StateStore::open(dir.path().join("state.json")).await);
        let config = config_with(
            vec![
                RemediationCommand {
                    id: "a".into(),
                    label: "a".into(),
                    shell: "true".into(),
                    cooldown_minutes: 0,
                },
                RemediationCommand {
                    id: "b".into(),
                    label: "b".into(),
                    shell: "true".into(),
                    cooldown_minutes: 0,
                },
            ],
            1,
        );
        let guardrail = Guardrail::new(config, store);

        let proposals = vec![
            Proposal {
                command_id: "a".into(),
                reason: "first".into(),
            },
            Proposal {
                command_id: "b".into(),
                reason: "second".into(),
            },
            Proposal {
                command_id: "missing".into(),
                reason: "third".into(),
            },
        ];
        let lines = guardrail.process(&proposals).await;

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("executed"));
        assert!(lines[1].contains("daily remediation quota reached"));
        assert!(lines[2].contains("daily remediation quota reached"));
    }

    #[tokio::test]
    async fn failing_command_reports_and_still_consumes_quota() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(StateStore::open(dir.path().join("state.json")).await);
        let config = config_with(
            vec![RemediationCommand {
                id: "fail".into(),
                label: "failing step".into(),
                shell: "exit 3".into(),
                cooldown_minutes: 0,
            }],
            5,
        );
        let guardrail = Guardrail::new(config, Arc::clone(&store));

        let lines = guardrail
            .process(&[Proposal {
                command_id: "fail".into(),
                reason: "test".into(),
            }])
            .await;

        assert!(lines[0].contains("failing step exited with"), "got: {}", lines[0]);
        assert_eq!(store.ledger().await.daily.count, 1);
    }
}
