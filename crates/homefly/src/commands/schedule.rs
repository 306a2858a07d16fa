//! Schedule command handlers.
//!
//! One-shot invocations mutate the durable action list; actual firing
//! happens inside `homefly serve`, which re-arms timers from that list.

use std::sync::Arc;

use tabled::settings::Style;
use tabled::{Table, Tabled};
use tokio::sync::mpsc;

use homefly_core::scheduler::Action;
use homefly_core::{Registry, ScheduledAction, Scheduler, StateStore};

use crate::cli::{GlobalOpts, OutputFormat, ScheduleArgs, ScheduleCommand};
use crate::config;
use crate::error::CliError;

use super::util;

pub async fn handle(args: ScheduleArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let core_config = config::build_core_config(global)?;
    let store = Arc::new(StateStore::open(&core_config.state_path).await);
    let registry = Arc::new(Registry::new(core_config));
    // The restart channel is unused in one-shot mode; serve owns it.
    let (restart_tx, _restart_rx) = mpsc::channel(1);
    let scheduler = Scheduler::new(store, registry.clone(), restart_tx);

    match args.command {
        ScheduleCommand::List => {
            let actions = scheduler.list().await;
            print_actions(&actions, global.output)
        }

        ScheduleCommand::Set {
            id,
            on,
            off,
            brightness,
            when,
        } => {
            let entity_id = util::parse_entity_id(&id)?;
            let patch = util::patch_from_flags(on, off, brightness)?;
            let run_at = util::parse_when(&when)?;

            // Catch typos now rather than when the timer fires.
            registry.refresh("schedule").await;
            if registry.get(&entity_id).is_none() {
                return Err(CliError::EntityNotFound {
                    id: entity_id.to_string(),
                });
            }

            let action_id = scheduler
                .schedule(
                    run_at,
                    Action::SetEntity {
                        entity_id,
                        on: patch.on,
                        brightness: patch.brightness,
                    },
                )
                .await?;
            println!("Scheduled {action_id} for {run_at}");
            Ok(())
        }

        ScheduleCommand::Restart { reason, when } => {
            let run_at = util::parse_when(&when)?;
            let action_id = scheduler
                .schedule(run_at, Action::RestartHost { reason })
                .await?;
            println!("Scheduled {action_id} for {run_at}");
            Ok(())
        }

        ScheduleCommand::Cancel { id } => {
            if !scheduler.cancel(&id).await? {
                return Err(CliError::ActionNotFound { id });
            }
            println!("Cancelled {id}");
            Ok(())
        }
    }
}

#[derive(Tabled)]
struct ActionRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "RUNS AT")]
    run_at: String,
    #[tabled(rename = "ACTION")]
    action: String,
}

fn print_actions(actions: &[ScheduledAction], format: OutputFormat) -> Result<(), CliError> {
    if format == OutputFormat::Json {
        return util::print_json(&actions);
    }
    if actions.is_empty() {
        println!("No pending actions.");
        return Ok(());
    }

    let rows: Vec<ActionRow> = actions
        .iter()
        .map(|a| ActionRow {
            id: a.id.clone(),
            run_at: a.run_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            action: describe(&a.action),
        })
        .collect();

    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}

fn describe(action: &Action) -> String {
    match action {
        Action::SetEntity {
            entity_id,
            on,
            brightness,
        } => {
            let mut parts = Vec::new();
            if let Some(on) = on {
                parts.push(if *on { "on".to_owned() } else { "off".to_owned() });
            }
            if let Some(b) = brightness {
                parts.push(format!("brightness {b}"));
            }
            format!("set {entity_id}: {}", parts.join(", "))
        }
        Action::RestartHost { reason } => format!("restart host: {reason}"),
    }
}
