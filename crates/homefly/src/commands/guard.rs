//! Guardrail command handlers.

use std::sync::Arc;

use tabled::settings::Style;
use tabled::{Table, Tabled};

use homefly_core::{Guardrail, Proposal, StateStore};

use crate::cli::{GlobalOpts, GuardArgs, GuardCommand, OutputFormat};
use crate::config;
use crate::error::CliError;

use super::util;

pub async fn handle(args: GuardArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let core_config = config::build_core_config(global)?;
    let store = Arc::new(StateStore::open(&core_config.state_path).await);

    match args.command {
        GuardCommand::List => {
            let ledger = store.ledger().await;
            if global.output == OutputFormat::Json {
                return util::print_json(&serde_json::json!({
                    "commands": core_config.guardrail.commands,
                    "ledger": ledger,
                }));
            }

            if core_config.guardrail.commands.is_empty() {
                println!("No remediation commands allowlisted.");
                return Ok(());
            }

            let rows: Vec<CommandRow> = core_config
                .guardrail
                .commands
                .iter()
                .map(|c| CommandRow {
                    id: c.id.clone(),
                    label: c.label.clone(),
                    cooldown: format!("{}m", c.cooldown_minutes),
                    last_run: ledger.cooldowns.get(&c.id).map_or_else(
                        || "never".into(),
                        |t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                    ),
                })
                .collect();
            println!("{}", Table::new(rows).with(Style::rounded()));
            println!(
                "Executions today: {} / {}",
                ledger.daily.count, core_config.guardrail.daily_cap
            );
            Ok(())
        }

        GuardCommand::Run { ids, reason } => {
            // Fail fast on typos; the engine itself still re-checks the
            // allowlist for proposals arriving from other sources.
            for id in &ids {
                if !core_config.guardrail.commands.iter().any(|c| &c.id == id) {
                    return Err(CliError::NotAllowlisted { id: id.clone() });
                }
            }

            let proposals: Vec<Proposal> = ids
                .into_iter()
                .map(|command_id| Proposal {
                    command_id,
                    reason: reason.clone(),
                })
                .collect();

            let guardrail = Guardrail::new(core_config.guardrail, store);
            for line in guardrail.process(&proposals).await {
                println!("{line}");
            }
            Ok(())
        }
    }
}

#[derive(Tabled)]
struct CommandRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "LABEL")]
    label: String,
    #[tabled(rename = "COOLDOWN")]
    cooldown: String,
    #[tabled(rename = "LAST RUN")]
    last_run: String,
}
