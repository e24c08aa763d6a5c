use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::SyncEngine;
use crate::host::MainTask;
use crate::notice::Notice;
use crate::snapshot::InventorySnapshot;
use crate::state::{Flight, PlayerId, SyncEntry};

/// What a call to [`SyncEngine::ensure_fetched`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// A snapshot was already cached and the call was not forced.
    Cached,
    /// Another fetch for the same player was running; nothing was done.
    AlreadyInFlight,
    /// A new snapshot was stored. Carries the snapshot it replaced.
    Fetched {
        previous: Option<Arc<InventorySnapshot>>,
    },
    /// The remote call failed or returned nothing; the cache is untouched.
    Failed,
    /// The player left before or during the fetch.
    Disconnected,
}

/// Reply to a player-initiated refresh.
#[derive(Debug)]
pub enum RefreshOutcome {
    Disabled,
    Disconnected,
    Cooldown { remaining: i64 },
    InProgress,
    /// A forced refresh was spawned.
    Started(JoinHandle<FetchOutcome>),
}

impl SyncEngine {
    /// Make sure `player` has a cached snapshot, or replace it when `force`.
    ///
    /// At most one fetch per player runs at a time; a call that finds one in
    /// flight returns [`FetchOutcome::AlreadyInFlight`] without waiting.
    pub async fn ensure_fetched(&self, player: PlayerId, force: bool) -> FetchOutcome {
        match self.registry.lookup(player) {
            Some(entry) => self.fetch_entry(&entry, force).await,
            None => FetchOutcome::Disconnected,
        }
    }

    pub(crate) async fn fetch_entry(&self, entry: &Arc<SyncEntry>, force: bool) -> FetchOutcome {
        let player = entry.id();
        if !force && entry.read(|state| state.has_snapshot()) {
            return FetchOutcome::Cached;
        }
        let Some(guard) = entry.try_begin(Flight::Fetch) else {
            debug!(target: "invsim::fetch", %player, "fetch.skipped=in_flight");
            return FetchOutcome::AlreadyInFlight;
        };
        self.metrics.fetch_started();

        let outcome = match self.api.fetch_equipped(player).await {
            Ok(Some(equipped)) if self.registry.is_current(entry) => {
                let fresh = InventorySnapshot::new(equipped);
                let fingerprint = fresh.fingerprint();
                let now = self.clock.now_unix();
                let previous = entry.update(|state| state.replace_snapshot(fresh, now));
                entry.set_loaded_from_file(false);
                info!(target: "invsim::fetch", %player, %fingerprint, force, "fetch.completed");
                FetchOutcome::Fetched { previous }
            }
            Ok(Some(_)) => {
                debug!(target: "invsim::fetch", %player, "fetch.discarded=disconnected");
                FetchOutcome::Disconnected
            }
            Ok(None) => {
                self.metrics.fetch_failed();
                warn!(target: "invsim::fetch", %player, "fetch.failed=empty");
                FetchOutcome::Failed
            }
            Err(err) => {
                self.metrics.fetch_failed();
                warn!(target: "invsim::fetch", %player, error = %err, "fetch.failed");
                FetchOutcome::Failed
            }
        };

        drop(guard);
        entry.signal_fetch_finished();
        outcome
    }

    /// Fetch and schedule the visible follow-up.
    ///
    /// Unforced: the cached loadout is sent to the player. Forced: when a new
    /// snapshot arrived, the player is told and the changed slots are
    /// re-given against the pre-refresh snapshot.
    pub async fn refresh(&self, player: PlayerId, force: bool) -> FetchOutcome {
        let Some(entry) = self.registry.lookup(player) else {
            return FetchOutcome::Disconnected;
        };
        let outcome = self.fetch_entry(&entry, force).await;

        match (&outcome, force) {
            (FetchOutcome::Disconnected, _) => {}
            (_, false) => self.main_tasks.push(MainTask::LoadInventory { entry }),
            (FetchOutcome::Fetched { previous }, true) => {
                self.main_tasks.push(MainTask::RefreshCompleted {
                    entry,
                    previous: previous.clone(),
                });
            }
            (FetchOutcome::Failed, true) => self.main_tasks.push(MainTask::Notify {
                entry,
                notice: Notice::RefreshFailed,
            }),
            (FetchOutcome::Cached | FetchOutcome::AlreadyInFlight, true) => {}
        }
        outcome
    }

    /// Player-initiated refresh with the cooldown and in-flight checks.
    pub fn request_refresh(self: &Arc<Self>, player: PlayerId) -> RefreshOutcome {
        if !self.config.ws_enabled {
            return RefreshOutcome::Disabled;
        }
        let Some(entry) = self.registry.lookup(player) else {
            return RefreshOutcome::Disconnected;
        };

        let cooldown = self.config.ws_cooldown_secs;
        let elapsed = self.clock.now_unix() - entry.read(|state| state.last_refresh_at());
        if elapsed < cooldown {
            return RefreshOutcome::Cooldown {
                remaining: cooldown - elapsed,
            };
        }
        if entry.in_flight(Flight::Fetch) {
            return RefreshOutcome::InProgress;
        }

        info!(target: "invsim::fetch", %player, "refresh.requested");
        let engine = Arc::clone(self);
        RefreshOutcome::Started(tokio::spawn(async move { engine.refresh(player, true).await }))
    }
}
