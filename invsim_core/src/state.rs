use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use invsim_proto::Fingerprint;
use tokio::sync::watch;

use crate::snapshot::InventorySnapshot;

/// Stable numeric identity of a connected player (their 64-bit account id).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u64);

impl PlayerId {
    pub fn user_id(self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote activity kinds that are polled and broadcast.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    CaseOpened,
    TradeUpCompleted,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::CaseOpened => f.write_str("case_opened"),
            EventKind::TradeUpCompleted => f.write_str("trade_up_completed"),
        }
    }
}

/// Result of checking a polled event against the join cutoff and the
/// last-broadcast marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventVerdict {
    Fresh,
    NotJoined,
    BeforeJoin,
    Duplicate,
}

/// Mutable per-player record. Only reachable through [`SyncEntry::read`] and
/// [`SyncEntry::update`], so every access is a single short critical section.
#[derive(Debug, Default)]
pub struct EntitySyncState {
    snapshot: Option<Arc<InventorySnapshot>>,
    fingerprint: Option<Fingerprint>,
    last_refresh_at: i64,
    last_spray_at: i64,
    joined_at: Option<DateTime<Utc>>,
    last_seen_case_opened_at: Option<DateTime<Utc>>,
    last_seen_trade_up_completed_at: Option<DateTime<Utc>>,
}

impl EntitySyncState {
    pub fn snapshot(&self) -> Option<Arc<InventorySnapshot>> {
        self.snapshot.clone()
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.fingerprint
    }

    pub fn last_refresh_at(&self) -> i64 {
        self.last_refresh_at
    }

    pub fn last_spray_at(&self) -> i64 {
        self.last_spray_at
    }

    pub fn joined_at(&self) -> Option<DateTime<Utc>> {
        self.joined_at
    }

    pub fn last_seen(&self, kind: EventKind) -> Option<DateTime<Utc>> {
        match kind {
            EventKind::CaseOpened => self.last_seen_case_opened_at,
            EventKind::TradeUpCompleted => self.last_seen_trade_up_completed_at,
        }
    }

    pub(crate) fn record_join(&mut self, at: DateTime<Utc>) {
        self.joined_at = Some(at);
    }

    pub(crate) fn stamp_spray(&mut self, now: i64) {
        self.last_spray_at = now;
    }

    /// Install a freshly fetched snapshot, merging the previous wear cache
    /// into it. Snapshot, fingerprint and refresh time move together.
    /// Returns the snapshot that was replaced.
    pub(crate) fn replace_snapshot(
        &mut self,
        fresh: InventorySnapshot,
        now: i64,
    ) -> Option<Arc<InventorySnapshot>> {
        let merged = match self.snapshot.as_deref() {
            Some(previous) => fresh.merged_with(previous),
            None => fresh,
        };
        self.fingerprint = Some(merged.fingerprint());
        self.last_refresh_at = now;
        self.snapshot.replace(Arc::new(merged))
    }

    pub(crate) fn set_baseline(&mut self, snapshot: InventorySnapshot) {
        self.fingerprint = Some(snapshot.fingerprint());
        self.snapshot = Some(Arc::new(snapshot));
    }

    pub(crate) fn revise_snapshot<R>(
        &mut self,
        edit: impl FnOnce(&mut invsim_proto::EquippedInventory) -> Option<R>,
    ) -> Option<R> {
        let current = self.snapshot.as_deref()?;
        let (revised, result) = current.revised(edit);
        let result = result?;
        self.fingerprint = Some(revised.fingerprint());
        self.snapshot = Some(Arc::new(revised));
        Some(result)
    }

    /// Apply the join cutoff and the dedup marker for one polled event,
    /// recording the marker when the event is fresh.
    pub(crate) fn observe_event(&mut self, kind: EventKind, at: DateTime<Utc>) -> EventVerdict {
        let Some(joined_at) = self.joined_at else {
            return EventVerdict::NotJoined;
        };
        if at < joined_at {
            return EventVerdict::BeforeJoin;
        }
        let marker = match kind {
            EventKind::CaseOpened => &mut self.last_seen_case_opened_at,
            EventKind::TradeUpCompleted => &mut self.last_seen_trade_up_completed_at,
        };
        if *marker == Some(at) {
            return EventVerdict::Duplicate;
        }
        *marker = Some(at);
        EventVerdict::Fresh
    }
}

/// Single-flight guards carried by every entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flight {
    Fetch,
    AutoReload,
    SignIn,
}

/// Clears its flag when dropped.
#[must_use = "the flight ends as soon as the guard is dropped"]
pub struct FlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
pub struct SyncEntry {
    id: PlayerId,
    bot: AtomicBool,
    fetching: AtomicBool,
    auto_reloading: AtomicBool,
    authenticating: AtomicBool,
    loaded_from_file: AtomicBool,
    fetch_signal: watch::Sender<u64>,
    state: Mutex<EntitySyncState>,
}

impl SyncEntry {
    fn new(id: PlayerId) -> Self {
        let (fetch_signal, _) = watch::channel(0);
        Self {
            id,
            bot: AtomicBool::new(false),
            fetching: AtomicBool::new(false),
            auto_reloading: AtomicBool::new(false),
            authenticating: AtomicBool::new(false),
            loaded_from_file: AtomicBool::new(false),
            fetch_signal,
            state: Mutex::new(EntitySyncState::default()),
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn is_bot(&self) -> bool {
        self.bot.load(Ordering::Acquire)
    }

    pub(crate) fn set_bot(&self, bot: bool) {
        self.bot.store(bot, Ordering::Release);
    }

    fn flag(&self, flight: Flight) -> &AtomicBool {
        match flight {
            Flight::Fetch => &self.fetching,
            Flight::AutoReload => &self.auto_reloading,
            Flight::SignIn => &self.authenticating,
        }
    }

    pub fn in_flight(&self, flight: Flight) -> bool {
        self.flag(flight).load(Ordering::Acquire)
    }

    /// Claim `flight` for the caller. `None` when it is already taken; the
    /// caller drops its request rather than waiting.
    pub fn try_begin(&self, flight: Flight) -> Option<FlightGuard<'_>> {
        let flag = self.flag(flight);
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard { flag })
    }

    pub fn is_loaded_from_file(&self) -> bool {
        self.loaded_from_file.load(Ordering::Acquire)
    }

    pub(crate) fn set_loaded_from_file(&self, loaded: bool) {
        self.loaded_from_file.store(loaded, Ordering::Release);
    }

    pub fn read<R>(&self, read: impl FnOnce(&EntitySyncState) -> R) -> R {
        let guard = self.state.lock().expect("entity sync state mutex poisoned");
        read(&guard)
    }

    pub(crate) fn update<R>(&self, update: impl FnOnce(&mut EntitySyncState) -> R) -> R {
        let mut guard = self.state.lock().expect("entity sync state mutex poisoned");
        update(&mut guard)
    }

    /// Receiver that observes a new value after every finished fetch attempt,
    /// successful or not.
    pub fn subscribe_fetches(&self) -> watch::Receiver<u64> {
        self.fetch_signal.subscribe()
    }

    pub(crate) fn signal_fetch_finished(&self) {
        self.fetch_signal
            .send_modify(|generation| *generation = generation.wrapping_add(1));
    }
}

/// Per-player records keyed by [`PlayerId`]. Sharded, so operations on
/// different players never contend on one lock.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entries: DashMap<PlayerId, Arc<SyncEntry>>,
}

impl EntityRegistry {
    /// Entry for `id`, created zero-valued on first access.
    pub fn get(&self, id: PlayerId) -> Arc<SyncEntry> {
        self.entries
            .entry(id)
            .or_insert_with(|| Arc::new(SyncEntry::new(id)))
            .clone()
    }

    pub fn lookup(&self, id: PlayerId) -> Option<Arc<SyncEntry>> {
        self.entries.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Whether `entry` is still the registered record for its player. False
    /// after a disconnect, and after a reconnect created a new record.
    pub fn is_current(&self, entry: &Arc<SyncEntry>) -> bool {
        self.entries
            .get(&entry.id())
            .is_some_and(|current| Arc::ptr_eq(current.value(), entry))
    }

    /// Drop every piece of state held for `id`, dedup markers included.
    pub fn remove(&self, id: PlayerId) -> Option<Arc<SyncEntry>> {
        self.entries.remove(&id).map(|(_, entry)| entry)
    }

    pub fn active_ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self
            .entries
            .iter()
            .filter(|entry| !entry.value().is_bot())
            .map(|entry| *entry.key())
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
