use tracing::debug;

use crate::engine::SyncEngine;
use crate::host::Host;
use crate::state::PlayerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SprayOutcome {
    Disabled,
    NotConnected,
    Cooldown { remaining: i64 },
    NoGraffiti,
    Sprayed,
}

impl SyncEngine {
    /// Spray the player's equipped graffiti if the cooldown allows it.
    /// Runs on the main context.
    pub fn try_spray(&self, player: PlayerId, host: &mut dyn Host) -> SprayOutcome {
        if !self.config.spray_enabled {
            return SprayOutcome::Disabled;
        }
        let Some(entry) = self.registry.lookup(player) else {
            return SprayOutcome::NotConnected;
        };

        let now = self.clock.now_unix();
        let cooldown = self.config.spray_cooldown_secs;
        let elapsed = now - entry.read(|state| state.last_spray_at());
        if elapsed < cooldown {
            return SprayOutcome::Cooldown {
                remaining: cooldown - elapsed,
            };
        }

        let graffiti = entry.read(|state| {
            state
                .snapshot()
                .and_then(|snapshot| snapshot.equipped().graffiti.clone())
                .filter(|graffiti| graffiti.def.is_some())
        });
        let Some(graffiti) = graffiti else {
            return SprayOutcome::NoGraffiti;
        };

        entry.update(|state| state.stamp_spray(now));
        debug!(target: "invsim::spray", %player, def = ?graffiti.def, "spray.applied");
        host.apply_spray(player, &graffiti);
        SprayOutcome::Sprayed
    }
}
