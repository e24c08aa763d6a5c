use std::sync::Arc;

use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::engine::SyncEngine;
use crate::host::MainTask;
use crate::notice::Notice;
use crate::state::PlayerId;
use crate::weighted::WeightedSelector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardOutcome {
    Disabled,
    NoApiKey,
    NotConnected,
    Bot,
    OptedOut,
    /// The chance roll did not hit.
    Missed,
    ItemGranted { item_id: u32 },
    ContainerGranted,
    Failed,
}

/// Draw result taken under the rng lock.
enum RewardDraw {
    Missed,
    Item(u32),
    Container,
}

impl SyncEngine {
    /// Grant round-win rewards to `winners`. Skipped entirely when rewards
    /// are disabled or no API key is configured.
    pub fn on_round_end(self: &Arc<Self>, winners: &[PlayerId]) -> Vec<JoinHandle<RewardOutcome>> {
        if !self.config.roundwin_enabled || !self.api.has_api_key() {
            debug!(
                target: "invsim::reward",
                enabled = self.config.roundwin_enabled,
                has_api_key = self.api.has_api_key(),
                "reward.skipped"
            );
            return Vec::new();
        }
        winners
            .iter()
            .copied()
            .map(|player| {
                let engine = Arc::clone(self);
                tokio::spawn(async move { engine.grant_round_win_reward(player).await })
            })
            .collect()
    }

    pub async fn grant_round_win_reward(&self, player: PlayerId) -> RewardOutcome {
        if !self.config.roundwin_enabled {
            return RewardOutcome::Disabled;
        }
        if !self.api.has_api_key() {
            return RewardOutcome::NoApiKey;
        }
        let Some(entry) = self.registry.lookup(player) else {
            return RewardOutcome::NotConnected;
        };
        if entry.is_bot() {
            return RewardOutcome::Bot;
        }
        if self.opt_out.is_opted_out(player) {
            return RewardOutcome::OptedOut;
        }

        let (result, outcome) = match self.draw_reward() {
            RewardDraw::Missed => return RewardOutcome::Missed,
            RewardDraw::Item(item_id) => (
                self.api.send_add_item(player, item_id).await,
                RewardOutcome::ItemGranted { item_id },
            ),
            RewardDraw::Container => (
                self.api.send_add_container(player).await,
                RewardOutcome::ContainerGranted,
            ),
        };
        if let Err(err) = result {
            error!(target: "invsim::reward", %player, error = %err, "reward.failed");
            return RewardOutcome::Failed;
        }

        self.metrics.reward_granted();
        info!(target: "invsim::reward", %player, outcome = ?outcome, "reward.granted");
        self.main_tasks.push(MainTask::Notify {
            entry,
            notice: Notice::RoundWinCase {
                prefix: self.config.chat_prefix.clone(),
            },
        });
        outcome
    }

    fn draw_reward(&self) -> RewardDraw {
        let chance = self.config.roundwin_chance;
        let mut rng = self.rng.lock().expect("engine rng mutex poisoned");
        if chance.is_nan() || chance <= 0.0 {
            return RewardDraw::Missed;
        }
        if chance < 1.0 && rng.gen::<f64>() >= chance {
            return RewardDraw::Missed;
        }
        let ids = self.config.reward_ids();
        WeightedSelector::new(self.config.roundwin_weight)
            .pick(&ids, &mut *rng)
            .copied()
            .map_or(RewardDraw::Container, RewardDraw::Item)
    }
}
