use std::sync::Arc;

use tracing::{debug, warn};

use crate::engine::SyncEngine;
use crate::state::PlayerId;

/// Equipped item whose kill counter should move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatTrakTarget {
    Weapon { team: u8, def: u16 },
    Knife { team: u8 },
    MusicKit,
}

impl SyncEngine {
    /// Bump the counter of the targeted item in a new snapshot revision and
    /// report it to the remote service. Returns the new count, or `None`
    /// when the item is missing or carries no counter.
    pub fn increment_stat_trak(self: &Arc<Self>, player: PlayerId, target: StatTrakTarget) -> Option<i32> {
        let entry = self.registry.lookup(player)?;
        let fallback = self.config.fallback_team;
        let (uid, count) = entry.update(|state| {
            state.revise_snapshot(|equipped| {
                let (uid, counter) = match target {
                    StatTrakTarget::Weapon { team, def } => {
                        let item = equipped.weapon_mut(team, def, fallback)?;
                        (item.uid?, item.stattrak.as_mut()?)
                    }
                    StatTrakTarget::Knife { team } => {
                        let item = equipped.knife_mut(team, fallback)?;
                        (item.uid?, item.stattrak.as_mut()?)
                    }
                    StatTrakTarget::MusicKit => {
                        let item = equipped.music_kit.as_mut()?;
                        // Negative counts mark kits without StatTrak.
                        (item.uid?, item.stattrak.as_mut().filter(|count| **count >= 0)?)
                    }
                };
                *counter = counter.saturating_add(1);
                Some((uid, *counter))
            })
        })?;
        debug!(target: "invsim::stattrak", %player, uid, count, "stattrak.incremented");

        if self.api.has_api_key() {
            let api = Arc::clone(&self.api);
            tokio::spawn(async move {
                if let Err(err) = api.send_stat_trak_increment(player, uid).await {
                    warn!(target: "invsim::stattrak", %player, uid, error = %err, "stattrak.report_failed");
                }
            });
        }
        Some(count)
    }

    /// A kill by `attacker` with the targeted item. Bot attackers never
    /// count; bot victims are ignored when `stattrak_ignore_bots` is set.
    pub fn on_player_kill(
        self: &Arc<Self>,
        attacker: PlayerId,
        victim_is_bot: bool,
        target: StatTrakTarget,
    ) -> Option<i32> {
        let entry = self.registry.lookup(attacker)?;
        if entry.is_bot() || (victim_is_bot && self.config.stattrak_ignore_bots) {
            return None;
        }
        self.increment_stat_trak(attacker, target)
    }

    /// Round MVP: counts on the equipped music kit.
    pub fn on_round_mvp(self: &Arc<Self>, player: PlayerId) -> Option<i32> {
        let entry = self.registry.lookup(player)?;
        if entry.is_bot() {
            return None;
        }
        self.increment_stat_trak(player, StatTrakTarget::MusicKit)
    }
}
