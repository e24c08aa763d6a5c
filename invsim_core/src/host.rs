use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use invsim_proto::GraffitiItem;

use crate::notice::Notice;
use crate::snapshot::{InventorySnapshot, SlotChanges};
use crate::state::{PlayerId, SyncEntry};

/// Main-context side of the game server. Every method is called from the
/// thread that drains [`MainTaskQueue`], never from a background task.
pub trait Host {
    fn is_connected(&self, player: PlayerId) -> bool;

    /// `message` still carries `{color}` tags.
    fn print_to_chat(&mut self, player: PlayerId, message: &str);

    /// Push the cached loadout to the player's client.
    fn send_inventory_update(&mut self, player: PlayerId, snapshot: Option<&InventorySnapshot>);

    /// Replace equipment in the slots listed in `changes`.
    fn regive(&mut self, player: PlayerId, snapshot: &InventorySnapshot, changes: &SlotChanges);

    fn apply_spray(&mut self, player: PlayerId, graffiti: &GraffitiItem);
}

/// Deferred work produced by background completions.
///
/// Each task carries the registry entry it was produced for. The drain
/// drops tasks whose entry has since been removed or replaced.
#[derive(Debug)]
pub enum MainTask {
    /// Send the cached loadout after an unforced refresh.
    LoadInventory { entry: Arc<SyncEntry> },
    /// A forced refresh produced a new snapshot.
    RefreshCompleted {
        entry: Arc<SyncEntry>,
        previous: Option<Arc<InventorySnapshot>>,
    },
    /// Auto-reload detected a remote change.
    ApplyChanges {
        entry: Arc<SyncEntry>,
        previous: Option<Arc<InventorySnapshot>>,
    },
    Notify { entry: Arc<SyncEntry>, notice: Notice },
}

impl MainTask {
    pub fn entry(&self) -> &Arc<SyncEntry> {
        match self {
            MainTask::LoadInventory { entry }
            | MainTask::RefreshCompleted { entry, .. }
            | MainTask::ApplyChanges { entry, .. }
            | MainTask::Notify { entry, .. } => entry,
        }
    }
}

#[derive(Debug)]
pub struct MainTaskQueue {
    sender: Sender<MainTask>,
    receiver: Receiver<MainTask>,
}

impl Default for MainTaskQueue {
    fn default() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }
}

impl MainTaskQueue {
    pub fn push(&self, task: MainTask) {
        // Both halves live in `self`, so the channel cannot be disconnected.
        let _ = self.sender.send(task);
    }

    /// Everything queued so far, in push order.
    pub fn take_pending(&self) -> Vec<MainTask> {
        self.receiver.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
