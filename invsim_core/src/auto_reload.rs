use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::SyncEngine;
use crate::host::MainTask;
use crate::snapshot::InventorySnapshot;
use crate::state::{Flight, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoReloadOutcome {
    /// Bot, file-backed, or another fetch or check was already running.
    Skipped,
    Failed,
    /// First observation: stored without a visible refresh.
    Baseline,
    Unchanged,
    Changed,
    Disconnected,
}

impl SyncEngine {
    /// One change-detection pass over every connected human player.
    /// Does nothing while auto-reload is disabled.
    pub fn auto_reload_tick(self: &Arc<Self>) -> Vec<JoinHandle<AutoReloadOutcome>> {
        if !self.config.autoreload_enabled {
            return Vec::new();
        }
        self.registry
            .active_ids()
            .into_iter()
            .map(|player| {
                let engine = Arc::clone(self);
                tokio::spawn(async move { engine.auto_reload_entity(player).await })
            })
            .collect()
    }

    /// Fetch the player's loadout and swap it in only if its fingerprint
    /// differs from the stored one.
    pub async fn auto_reload_entity(&self, player: PlayerId) -> AutoReloadOutcome {
        let Some(entry) = self.registry.lookup(player) else {
            return AutoReloadOutcome::Disconnected;
        };
        if entry.is_bot() || entry.is_loaded_from_file() || entry.in_flight(Flight::Fetch) {
            return AutoReloadOutcome::Skipped;
        }
        let Some(_guard) = entry.try_begin(Flight::AutoReload) else {
            return AutoReloadOutcome::Skipped;
        };
        self.metrics.auto_reload_checked();

        let equipped = match self.api.fetch_equipped(player).await {
            Ok(Some(equipped)) => equipped,
            Ok(None) => {
                debug!(target: "invsim::auto_reload", %player, "auto_reload.failed=empty");
                return AutoReloadOutcome::Failed;
            }
            Err(err) => {
                warn!(target: "invsim::auto_reload", %player, error = %err, "auto_reload.failed");
                return AutoReloadOutcome::Failed;
            }
        };
        if !self.registry.is_current(&entry) {
            return AutoReloadOutcome::Disconnected;
        }
        if entry.is_loaded_from_file() {
            return AutoReloadOutcome::Skipped;
        }

        let fresh = InventorySnapshot::new(equipped);
        let fingerprint = fresh.fingerprint();
        let now = self.clock.now_unix();
        let (outcome, previous) = entry.update(|state| match state.fingerprint() {
            None => {
                state.set_baseline(fresh);
                (AutoReloadOutcome::Baseline, None)
            }
            Some(stored) if stored == fingerprint => (AutoReloadOutcome::Unchanged, None),
            Some(_) => {
                let previous = state.replace_snapshot(fresh, now);
                (AutoReloadOutcome::Changed, previous)
            }
        });

        match outcome {
            AutoReloadOutcome::Changed => {
                self.metrics.auto_reload_changed();
                info!(target: "invsim::auto_reload", %player, %fingerprint, "auto_reload.changed");
                self.main_tasks.push(MainTask::ApplyChanges {
                    entry: Arc::clone(&entry),
                    previous,
                });
            }
            AutoReloadOutcome::Baseline => {
                debug!(target: "invsim::auto_reload", %player, %fingerprint, "auto_reload.baseline");
            }
            _ => {}
        }
        outcome
    }
}
