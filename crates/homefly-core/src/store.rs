// ── Durable state store ──
//
// One JSON document holds the scheduled-action list and the guardrail
// ledger. Loaded once at startup, rewritten whole (never appended) after
// every mutating operation, before that operation returns.
//
// Loading is lenient: a corrupt file or an undecodable individual action
// record is logged and dropped, never fatal. Losing a record beats
// refusing to start.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::CoreError;
use crate::guardrail::GuardrailLedger;
use crate::scheduler::ScheduledAction;

#[derive(Debug, Default, Serialize)]
struct PersistedState {
    actions: Vec<ScheduledAction>,
    guardrail: GuardrailLedger,
}

/// Lenient mirror of [`PersistedState`] used only during load.
#[derive(Debug, Default, Deserialize)]
struct RawState {
    #[serde(default)]
    actions: Vec<serde_json::Value>,
    #[serde(default)]
    guardrail: Option<serde_json::Value>,
}

/// Whole-file JSON persistence for scheduler and guardrail state.
pub struct StateStore {
    path: PathBuf,
    state: Mutex<PersistedState>,
}

impl StateStore {
    /// Open the store, loading whatever state the file holds.
    ///
    /// Never fails: a missing file starts empty, a corrupt one is logged
    /// and replaced on the next write.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = load_lenient(&path).await;
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    // ── Scheduled actions ────────────────────────────────────────────

    /// Snapshot of all persisted actions.
    pub async fn actions(&self) -> Vec<ScheduledAction> {
        self.state.lock().await.actions.clone()
    }

    /// Append an action and flush.
    pub async fn add_action(&self, action: ScheduledAction) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;
        state.actions.push(action);
        self.persist(&state).await
    }

    /// Remove an action by id and flush. Returns whether it existed.
    pub async fn remove_action(&self, id: &str) -> Result<bool, CoreError> {
        let mut state = self.state.lock().await;
        let before = state.actions.len();
        state.actions.retain(|a| a.id != id);
        let removed = state.actions.len() != before;
        if removed {
            self.persist(&state).await?;
        }
        Ok(removed)
    }

    /// Drop every action whose run time is already past, flushing if
    /// anything was pruned. Returns the pruned records.
    pub async fn prune_actions(
        &self,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<ScheduledAction>, CoreError> {
        let mut state = self.state.lock().await;
        let (past, future): (Vec<_>, Vec<_>) =
            state.actions.drain(..).partition(|a| a.run_at <= now);
        state.actions = future;
        if !past.is_empty() {
            self.persist(&state).await?;
        }
        Ok(past)
    }

    // ── Guardrail ledger ─────────────────────────────────────────────

    /// Snapshot of the guardrail ledger.
    pub async fn ledger(&self) -> GuardrailLedger {
        self.state.lock().await.guardrail.clone()
    }

    /// Replace the guardrail ledger and flush.
    pub async fn set_ledger(&self, ledger: GuardrailLedger) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;
        state.guardrail = ledger;
        self.persist(&state).await
    }

    // ── Persistence ──────────────────────────────────────────────────

    async fn persist(&self, state: &PersistedState) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| CoreError::Internal(format!("state serialization failed: {e}")))?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

async fn load_lenient(path: &Path) -> PersistedState {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return PersistedState::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "state file unreadable; starting empty");
            return PersistedState::default();
        }
    };

    let raw: RawState = match serde_json::from_slice(&bytes) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "state file corrupt; starting empty");
            return PersistedState::default();
        }
    };

    let actions = raw
        .actions
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(action) => Some(action),
            Err(e) => {
                warn!(error = %e, "dropping undecodable scheduled action record");
                None
            }
        })
        .collect();

    let guardrail = raw
        .guardrail
        .and_then(|value| match serde_json::from_value(value) {
            Ok(ledger) => Some(ledger),
            Err(e) => {
                warn!(error = %e, "dropping undecodable guardrail ledger");
                None
            }
        })
        .unwrap_or_default();

    PersistedState { actions, guardrail }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::scheduler::Action;
    use chrono::{TimeDelta, Utc};

    fn sample_action(id: &str) -> ScheduledAction {
        ScheduledAction {
            id: id.into(),
            created_at: Utc::now(),
            run_at: Utc::now() + TimeDelta::hours(1),
            action: Action::RestartHost {
                reason: "test".into(),
            },
        }
    }

    #[tokio::test]
    async fn actions_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = StateStore::open(&path).await;
        store.add_action(sample_action("a1")).await.unwrap();
        store.add_action(sample_action("a2")).await.unwrap();
        assert!(store.remove_action("a1").await.unwrap());
        drop(store);

        let reopened = StateStore::open(&path).await;
        let actions = reopened.actions().await;
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].id, "a2");
    }

    #[tokio::test]
    async fn remove_missing_action_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state.json")).await;
        assert!(!store.remove_action("nope").await.unwrap());
    }

    #[tokio::test]
    async fn prune_drops_only_past_actions() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state.json")).await;

        let mut past = sample_action("past");
        past.run_at = Utc::now() - TimeDelta::minutes(5);
        store.add_action(past).await.unwrap();
        store.add_action(sample_action("future")).await.unwrap();

        let pruned = store.prune_actions(Utc::now()).await.unwrap();
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].id, "past");

        let remaining = store.actions().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "future");
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{{{ not json").unwrap();

        let store = StateStore::open(&path).await;
        assert!(store.actions().await.is_empty());
    }

    #[tokio::test]
    async fn undecodable_action_record_is_dropped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            format!(
                r#"{{ "actions": [ {}, {{ "id": "bad", "run_at": "not-a-time" }} ] }}"#,
                serde_json::to_string(&sample_action("good")).unwrap()
            ),
        )
        .unwrap();

        let store = StateStore::open(&path).await;
        let actions = store.actions().await;
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].id, "good");
    }
}
