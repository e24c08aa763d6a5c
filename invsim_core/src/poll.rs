use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use invsim_proto::parse_event_timestamp;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::engine::SyncEngine;
use crate::notice::Notice;
use crate::state::{EventKind, EventVerdict, PlayerId, SyncEntry};

/// Round-robin cursor over the active player list.
#[derive(Debug, Default)]
pub struct PollScheduler {
    cursor: Mutex<usize>,
}

impl PollScheduler {
    pub fn with_cursor(cursor: usize) -> Self {
        Self {
            cursor: Mutex::new(cursor),
        }
    }

    pub fn cursor(&self) -> usize {
        *self.cursor.lock().expect("poll cursor mutex poisoned")
    }

    /// Up to `max_per_tick` players starting at `cursor mod len`, wrapping.
    /// The cursor then moves forward by the batch size.
    pub fn next_batch(&self, active: &[PlayerId], max_per_tick: usize) -> Vec<PlayerId> {
        if active.is_empty() {
            return Vec::new();
        }
        let count = active.len();
        let batch = max_per_tick.max(1);
        let mut cursor = self.cursor.lock().expect("poll cursor mutex poisoned");
        let start = *cursor % count;
        let selected = (0..batch.min(count))
            .map(|offset| active[(start + offset) % count])
            .collect();
        *cursor = (start + batch % count) % count;
        selected
    }
}

/// Fate of one polled lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollVerdict {
    Enqueued,
    NoEvent,
    InvalidTimestamp,
    NotJoined,
    BeforeJoin,
    Duplicate,
    Disconnected,
    RemoteFailed,
}

impl From<EventVerdict> for PollVerdict {
    fn from(verdict: EventVerdict) -> Self {
        match verdict {
            EventVerdict::Fresh => PollVerdict::Enqueued,
            EventVerdict::NotJoined => PollVerdict::NotJoined,
            EventVerdict::BeforeJoin => PollVerdict::BeforeJoin,
            EventVerdict::Duplicate => PollVerdict::Duplicate,
        }
    }
}

impl SyncEngine {
    /// Poll the next batch of players. Each selected player gets two
    /// independent lookups; the handles resolve to their verdicts.
    pub fn poll_tick(self: &Arc<Self>) -> Vec<JoinHandle<PollVerdict>> {
        let active = self.registry.active_ids();
        let batch = self.poller.next_batch(&active, self.config.poll_batch_size());
        if !batch.is_empty() {
            trace!(target: "invsim::poll", selected = batch.len(), active = active.len(), "poll.tick");
        }

        let mut handles = Vec::with_capacity(batch.len() * 2);
        for player in batch {
            let engine = Arc::clone(self);
            handles.push(tokio::spawn(async move { engine.poll_case_opening(player).await }));
            let engine = Arc::clone(self);
            handles.push(tokio::spawn(async move { engine.poll_trade_up(player).await }));
            self.metrics.poll_issued();
            self.metrics.poll_issued();
        }
        handles
    }

    pub async fn poll_case_opening(&self, player: PlayerId) -> PollVerdict {
        let opening = match self.api.fetch_last_case_opening(player).await {
            Ok(Some(opening)) => opening,
            Ok(None) => return PollVerdict::NoEvent,
            Err(err) => {
                debug!(target: "invsim::poll", %player, error = %err, "poll.failed=case_opening");
                return PollVerdict::RemoteFailed;
            }
        };
        let at = match event_time(opening.opened_at.as_deref()) {
            Ok(at) => at,
            Err(verdict) => return verdict,
        };
        let notice = Notice::CaseOpened {
            user_name: opening.user_name,
            item_name: opening.unlocked_item_name,
            rarity: opening.rarity,
        };
        self.record_polled_event(player, EventKind::CaseOpened, at, notice)
    }

    pub async fn poll_trade_up(&self, player: PlayerId) -> PollVerdict {
        let trade_up = match self.api.fetch_last_trade_up(player).await {
            Ok(Some(trade_up)) => trade_up,
            Ok(None) => return PollVerdict::NoEvent,
            Err(err) => {
                debug!(target: "invsim::poll", %player, error = %err, "poll.failed=trade_up");
                return PollVerdict::RemoteFailed;
            }
        };
        let at = match event_time(trade_up.completed_at.as_deref()) {
            Ok(at) => at,
            Err(verdict) => return verdict,
        };
        let notice = Notice::TradeUpCompleted {
            user_name: trade_up.user_name,
            item_name: trade_up.output_item_name,
            rarity: trade_up.rarity,
        };
        self.record_polled_event(player, EventKind::TradeUpCompleted, at, notice)
    }

    fn record_polled_event(
        &self,
        player: PlayerId,
        kind: EventKind,
        at: DateTime<Utc>,
        notice: Notice,
    ) -> PollVerdict {
        let Some(entry) = self.registry.lookup(player) else {
            return PollVerdict::Disconnected;
        };
        let verdict = observe(&entry, kind, at);
        match verdict {
            PollVerdict::Enqueued => {
                self.broadcasts.enqueue(notice.to_string());
                self.metrics.broadcast_enqueued();
                debug!(target: "invsim::poll", %player, %kind, %at, "poll.enqueued");
            }
            other => {
                trace!(target: "invsim::poll", %player, %kind, verdict = ?other, "poll.discarded");
            }
        }
        verdict
    }
}

fn observe(entry: &SyncEntry, kind: EventKind, at: DateTime<Utc>) -> PollVerdict {
    entry.update(|state| state.observe_event(kind, at)).into()
}

fn event_time(raw: Option<&str>) -> Result<DateTime<Utc>, PollVerdict> {
    let raw = raw
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .ok_or(PollVerdict::NoEvent)?;
    parse_event_timestamp(raw).ok_or(PollVerdict::InvalidTimestamp)
}
