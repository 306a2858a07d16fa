//! The long-lived service mode: periodic registry refresh, the durable
//! scheduler, and the host-restart channel.
//!
//! A restart request is honored by exiting cleanly after a short grace
//! period; a process supervisor (systemd, launchd) brings us back up,
//! and startup replays the persisted action list.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use homefly_core::{Registry, Scheduler, StateStore};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;

/// Delay between a restart request and process exit, giving in-flight
/// work a chance to settle.
const RESTART_GRACE: Duration = Duration::from_secs(2);

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let core_config = config::build_core_config(global)?;

    let store = Arc::new(StateStore::open(&core_config.state_path).await);
    let registry = Arc::new(Registry::new(core_config));
    let (restart_tx, mut restart_rx) = mpsc::channel::<String>(4);
    let scheduler = Scheduler::new(Arc::clone(&store), Arc::clone(&registry), restart_tx);

    let count = registry.refresh("startup").await;
    info!(entities = count, "service started");

    // Replay persisted actions: prune the past, arm the future.
    scheduler.sync().await?;

    let cancel = CancellationToken::new();
    let refresh_task = registry.spawn_refresh_task(cancel.clone());

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
        reason = restart_rx.recv() => {
            let reason = reason.unwrap_or_else(|| "restart channel closed".into());
            warn!(%reason, "host restart requested; exiting for supervisor restart");
            tokio::time::sleep(RESTART_GRACE).await;
            cancel.cancel();
            std::process::exit(0);
        }
    }

    cancel.cancel();
    if let Some(task) = refresh_task {
        let _ = task.await;
    }
    Ok(())
}
