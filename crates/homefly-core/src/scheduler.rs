// ── Durable one-shot scheduler ──
//
// Actions are persisted before their timer is armed, so a crash between
// schedule and fire loses nothing. Timers sleep in bounded slices and
// recompute the remaining delay from the stored run time on every wake,
// which keeps arbitrarily far-out actions accurate without chained
// fixed-width timers.
//
// Execution is at-most-once: the persisted record is removed after the
// attempt regardless of outcome. A failed effect is logged, not retried.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::{EntityId, EntityPatch};
use crate::registry::Registry;
use crate::store::StateStore;

/// Upper bound for a single timer sleep. Longer waits loop and
/// recompute from the wall clock.
const MAX_TIMER_SLICE: Duration = Duration::from_secs(23 * 24 * 60 * 60);

// ── Persisted shapes ────────────────────────────────────────────────

/// The effect a scheduled action performs when it fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Apply a state patch to one entity.
    SetEntity {
        entity_id: EntityId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        on: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        brightness: Option<f64>,
    },
    /// Ask the hosting process to restart itself.
    RestartHost { reason: String },
}

/// One durable one-shot action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledAction {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub run_at: DateTime<Utc>,
    pub action: Action,
}

// ── Scheduler ───────────────────────────────────────────────────────

struct TimerEntry {
    cancel: CancellationToken,
}

struct SchedulerInner {
    store: Arc<StateStore>,
    registry: Arc<Registry>,
    restart_tx: mpsc::Sender<String>,
    timers: Mutex<HashMap<String, TimerEntry>>,
}

/// Durable one-shot action scheduler. Cheap to clone.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(
        store: Arc<StateStore>,
        registry: Arc<Registry>,
        restart_tx: mpsc::Sender<String>,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                store,
                registry,
                restart_tx,
                timers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Reconcile with the persisted action list: prune actions whose run
    /// time passed while we were down, then arm timers for the rest.
    /// Called once at startup and again after any out-of-band state edit.
    pub async fn sync(&self) -> Result<(), CoreError> {
        let pruned = self.inner.store.prune_actions(Utc::now()).await?;
        for stale in &pruned {
            info!(id = %stale.id, run_at = %stale.run_at, "dropping action whose run time already passed");
        }

        let actions = self.inner.store.actions().await;
        let mut timers = self.inner.timers.lock().await;

        // Cancel timers for actions no longer on disk.
        let live: std::collections::HashSet<&str> =
            actions.iter().map(|a| a.id.as_str()).collect();
        timers.retain(|id, entry| {
            if live.contains(id.as_str()) {
                true
            } else {
                entry.cancel.cancel();
                false
            }
        });

        // Arm timers for actions that do not have one yet.
        for action in actions {
            if timers.contains_key(&action.id) {
                continue;
            }
            let cancel = CancellationToken::new();
            timers.insert(
                action.id.clone(),
                TimerEntry {
                    cancel: cancel.clone(),
                },
            );
            tokio::spawn(run_timer(self.clone(), action, cancel));
        }

        Ok(())
    }

    /// Persist a new action and arm its timer. Returns the action id.
    pub async fn schedule(
        &self,
        run_at: DateTime<Utc>,
        action: Action,
    ) -> Result<String, CoreError> {
        let record = ScheduledAction {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            run_at,
            action,
        };
        let id = record.id.clone();

        // Persist first: a crash after this point replays on restart.
        self.inner.store.add_action(record.clone()).await?;

        let cancel = CancellationToken::new();
        self.inner.timers.lock().await.insert(
            id.clone(),
            TimerEntry {
                cancel: cancel.clone(),
            },
        );
        tokio::spawn(run_timer(self.clone(), record, cancel));

        info!(%id, %run_at, "scheduled action");
        Ok(id)
    }

    /// Cancel a pending action: remove the record and stop its timer.
    /// Returns whether the action existed.
    pub async fn cancel(&self, id: &str) -> Result<bool, CoreError> {
        let removed = self.inner.store.remove_action(id).await?;
        if let Some(entry) = self.inner.timers.lock().await.remove(id) {
            entry.cancel.cancel();
        }
        if removed {
            info!(%id, "cancelled action");
        }
        Ok(removed)
    }

    /// Snapshot of all pending actions.
    pub async fn list(&self) -> Vec<ScheduledAction> {
        self.inner.store.actions().await
    }

    async fn fire(&self, action: ScheduledAction) {
        debug!(id = %action.id, "action timer fired");

        let result = match &action.action {
            Action::SetEntity {
                entity_id,
                on,
                brightness,
            } => self
                .inner
                .registry
                .set(
                    entity_id,
                    EntityPatch {
                        on: *on,
                        brightness: *brightness,
                    },
                )
                .await
                .map(|_| ()),
            Action::RestartHost { reason } => self
                .inner
                .restart_tx
                .send(reason.clone())
                .await
                .map_err(|_| CoreError::Internal("restart channel closed".into())),
        };

        match result {
            Ok(()) => info!(id = %action.id, "action executed"),
            Err(e) => warn!(id = %action.id, error = %e, "action failed; not retrying"),
        }

        // At-most-once: the record goes away whether the effect landed
        // or not.
        if let Err(e) = self.inner.store.remove_action(&action.id).await {
            warn!(id = %action.id, error = %e, "failed to remove completed action record");
        }
        self.inner.timers.lock().await.remove(&action.id);
    }
}

/// Sleep until the action's run time, in bounded slices, then fire.
/// Recomputing the remaining delay from `run_at` on each wake keeps long
/// waits honest across clock drift and suspend.
async fn run_timer(scheduler: Scheduler, action: ScheduledAction, cancel: CancellationToken) {
    loop {
        let remaining = action.run_at - Utc::now();
        let Ok(remaining) = remaining.to_std() else {
            break; // run time reached (or already past)
        };

        let slice = remaining.min(MAX_TIMER_SLICE);
        tokio::select! {
            () = cancel.cancelled() => {
                debug!(id = %action.id, "timer cancelled");
                return;
            }
            () = tokio::time::sleep(slice) => {}
        }
    }

    if cancel.is_cancelled() {
        return;
    }
    scheduler.fire(action).await;
}
