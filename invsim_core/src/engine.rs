use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use invsim_proto::EquippedInventory;
use rand::{rngs::SmallRng, SeedableRng};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broadcast::BroadcastQueue;
use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::fetch::FetchOutcome;
use crate::file_inventories::{FileInventories, FileInventoryError};
use crate::host::{Host, MainTask, MainTaskQueue};
use crate::metrics::SyncMetrics;
use crate::notice::Notice;
use crate::opt_out::NoCasesOptOut;
use crate::poll::PollScheduler;
use crate::remote::InventoryApi;
use crate::snapshot::{InventorySnapshot, SlotChanges};
use crate::state::{EntityRegistry, PlayerId, SyncEntry};

/// Owns every piece of per-player and process-wide sync state.
///
/// Background operations take `self: &Arc<Self>` and spawn onto the ambient
/// tokio runtime. Host-visible effects are queued as [`MainTask`]s and only
/// applied by [`SyncEngine::run_main_tasks`].
pub struct SyncEngine {
    pub(crate) config: Arc<SyncConfig>,
    pub(crate) api: Arc<dyn InventoryApi>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) registry: EntityRegistry,
    pub(crate) poller: PollScheduler,
    pub(crate) broadcasts: BroadcastQueue,
    pub(crate) main_tasks: MainTaskQueue,
    pub(crate) opt_out: NoCasesOptOut,
    pub(crate) file_inventories: RwLock<FileInventories>,
    pub(crate) metrics: SyncMetrics,
    pub(crate) rng: Mutex<SmallRng>,
}

pub struct SyncEngineBuilder {
    config: Arc<SyncConfig>,
    api: Arc<dyn InventoryApi>,
    clock: Arc<dyn Clock>,
    opt_out: Option<NoCasesOptOut>,
    file_inventories: Option<FileInventories>,
    rng_seed: Option<u64>,
    poll_cursor: usize,
}

impl SyncEngineBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn opt_out(mut self, opt_out: NoCasesOptOut) -> Self {
        self.opt_out = Some(opt_out);
        self
    }

    pub fn file_inventories(mut self, inventories: FileInventories) -> Self {
        self.file_inventories = Some(inventories);
        self
    }

    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn poll_cursor(mut self, cursor: usize) -> Self {
        self.poll_cursor = cursor;
        self
    }

    pub fn build(self) -> Arc<SyncEngine> {
        let config = self.config;
        let opt_out = self
            .opt_out
            .unwrap_or_else(|| NoCasesOptOut::load(config.nocases_path.clone()));
        let file_inventories = self.file_inventories.unwrap_or_else(|| {
            config
                .inventory_file
                .as_deref()
                .and_then(|path| match FileInventories::from_file(path) {
                    Ok(inventories) => Some(inventories),
                    Err(err) => {
                        warn!(
                            target: "invsim::file",
                            path = %path.display(),
                            error = %err,
                            "inventory_file.load_failed"
                        );
                        None
                    }
                })
                .unwrap_or_default()
        });
        let rng = match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };

        Arc::new(SyncEngine {
            config,
            api: self.api,
            clock: self.clock,
            registry: EntityRegistry::default(),
            poller: PollScheduler::with_cursor(self.poll_cursor),
            broadcasts: BroadcastQueue::default(),
            main_tasks: MainTaskQueue::default(),
            opt_out,
            file_inventories: RwLock::new(file_inventories),
            metrics: SyncMetrics::default(),
            rng: Mutex::new(rng),
        })
    }
}

impl SyncEngine {
    pub fn builder(config: Arc<SyncConfig>, api: Arc<dyn InventoryApi>) -> SyncEngineBuilder {
        SyncEngineBuilder {
            config,
            api,
            clock: Arc::new(SystemClock),
            opt_out: None,
            file_inventories: None,
            rng_seed: None,
            poll_cursor: 0,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn broadcasts(&self) -> &BroadcastQueue {
        &self.broadcasts
    }

    pub fn main_tasks(&self) -> &MainTaskQueue {
        &self.main_tasks
    }

    pub fn metrics(&self) -> &SyncMetrics {
        &self.metrics
    }

    pub fn opt_out(&self) -> &NoCasesOptOut {
        &self.opt_out
    }

    pub fn poller(&self) -> &PollScheduler {
        &self.poller
    }

    pub fn now_unix(&self) -> i64 {
        self.clock.now_unix()
    }

    /// Register a connecting player and start loading their inventory.
    ///
    /// Players listed in the static inventory file get that loadout at once
    /// and are never fetched. Everyone else gets an unforced refresh; the
    /// returned handle resolves when it finishes.
    pub fn on_connect(self: &Arc<Self>, player: PlayerId, is_bot: bool) -> Option<JoinHandle<FetchOutcome>> {
        let entry = self.registry.get(player);
        entry.set_bot(is_bot);
        let joined_at = self.clock.now_utc();
        entry.update(|state| state.record_join(joined_at));
        info!(target: "invsim::engine", %player, is_bot, "player.connected");

        if is_bot {
            return None;
        }

        let from_file = self
            .file_inventories
            .read()
            .expect("file inventories lock poisoned")
            .get(player)
            .cloned();
        if let Some(equipped) = from_file {
            self.install_file_inventory(&entry, equipped);
            return None;
        }

        let engine = Arc::clone(self);
        Some(tokio::spawn(async move { engine.refresh(player, false).await }))
    }

    /// Forget everything held for `player`. In-flight work for the old
    /// entry finds it gone and discards its result.
    pub fn on_disconnect(&self, player: PlayerId) {
        if self.registry.remove(player).is_some() {
            info!(target: "invsim::engine", %player, "player.disconnected");
        }
    }

    /// Replace the static inventories with the contents of `path` and hand
    /// the new loadouts to connected players listed in it. On failure the
    /// previous contents stay in place. Returns how many players were
    /// reassigned.
    pub fn reload_inventory_file(&self, path: &Path) -> Result<usize, FileInventoryError> {
        let inventories = match FileInventories::from_file(path) {
            Ok(inventories) => inventories,
            Err(err) => {
                warn!(
                    target: "invsim::file",
                    path = %path.display(),
                    error = %err,
                    "inventory_file.load_failed"
                );
                return Err(err);
            }
        };

        let mut reassigned = 0;
        for player in self.registry.active_ids() {
            let Some(equipped) = inventories.get(player).cloned() else {
                continue;
            };
            if let Some(entry) = self.registry.lookup(player) {
                self.install_file_inventory(&entry, equipped);
                reassigned += 1;
            }
        }
        info!(
            target: "invsim::file",
            path = %path.display(),
            players = inventories.len(),
            reassigned,
            "inventory_file.loaded"
        );
        *self
            .file_inventories
            .write()
            .expect("file inventories lock poisoned") = inventories;
        Ok(reassigned)
    }

    pub fn reload_configured_inventory_file(&self) -> Result<usize, FileInventoryError> {
        match self.config.inventory_file.as_deref() {
            Some(path) => self.reload_inventory_file(path),
            None => Ok(0),
        }
    }

    fn install_file_inventory(&self, entry: &Arc<SyncEntry>, equipped: EquippedInventory) {
        let snapshot = InventorySnapshot::new(equipped);
        debug!(
            target: "invsim::file",
            player = %entry.id(),
            fingerprint = %snapshot.fingerprint(),
            "inventory_file.applied"
        );
        entry.update(|state| state.set_baseline(snapshot));
        entry.set_loaded_from_file(true);
        self.main_tasks.push(MainTask::LoadInventory {
            entry: Arc::clone(entry),
        });
    }

    /// Apply every queued main-context task. Tasks for players that left
    /// (or reconnected) since the task was queued are dropped. Returns the
    /// number of tasks applied.
    pub fn run_main_tasks(&self, host: &mut dyn Host) -> usize {
        let mut applied = 0;
        for task in self.main_tasks.take_pending() {
            let entry = task.entry();
            let player = entry.id();
            if !self.registry.is_current(entry) || !host.is_connected(player) {
                debug!(target: "invsim::engine", %player, "main_task.dropped=disconnected");
                continue;
            }
            match task {
                MainTask::LoadInventory { entry } => {
                    let snapshot = entry.read(|state| state.snapshot());
                    host.send_inventory_update(player, snapshot.as_deref());
                }
                MainTask::RefreshCompleted { entry, previous } => {
                    host.print_to_chat(player, &Notice::RefreshCompleted.to_string());
                    let snapshot = entry.read(|state| state.snapshot());
                    host.send_inventory_update(player, snapshot.as_deref());
                    if self.config.ws_immediately {
                        if let Some(snapshot) = snapshot {
                            regive_changed(host, player, previous.as_deref(), &snapshot);
                        }
                    }
                }
                MainTask::ApplyChanges { entry, previous } => {
                    let snapshot = entry.read(|state| state.snapshot());
                    host.send_inventory_update(player, snapshot.as_deref());
                    if let Some(snapshot) = snapshot {
                        regive_changed(host, player, previous.as_deref(), &snapshot);
                    }
                }
                MainTask::Notify { notice, .. } => {
                    host.print_to_chat(player, &notice.to_string());
                }
            }
            applied += 1;
        }
        applied
    }

    /// Deliver the oldest pending broadcast line to every connected human
    /// player. Returns the delivered line.
    pub fn drain_broadcast(&self, host: &mut dyn Host) -> Option<String> {
        let message = self.broadcasts.drain_one()?;
        let mut recipients = 0usize;
        for player in self.registry.active_ids() {
            if host.is_connected(player) {
                host.print_to_chat(player, &message);
                recipients += 1;
            }
        }
        self.metrics.broadcast_delivered();
        debug!(target: "invsim::broadcast", recipients, "broadcast.delivered");
        Some(message)
    }
}

fn regive_changed(
    host: &mut dyn Host,
    player: PlayerId,
    previous: Option<&InventorySnapshot>,
    current: &InventorySnapshot,
) {
    let changes = SlotChanges::between(previous.map(InventorySnapshot::equipped), current.equipped());
    if !changes.is_empty() {
        host.regive(player, current, &changes);
    }
}
