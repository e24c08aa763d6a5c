//! Chat commands players can type, mapped onto engine operations.
//!
//! Every handler runs on the main context and prints its replies directly
//! through the [`Host`]. Follow-up lines from background work arrive later
//! through the main task queue.

use std::sync::Arc;

use tracing::info;

use crate::engine::SyncEngine;
use crate::fetch::RefreshOutcome;
use crate::host::Host;
use crate::notice::Notice;
use crate::sign_in::SignInOutcome;
use crate::spray::SprayOutcome;
use crate::state::PlayerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand {
    /// `!ws`, also `!knife`, `!gloves` and `!agents`.
    Refresh,
    Spray,
    Login,
    NoCases,
}

impl ChatCommand {
    /// Accepts bare names and the `!`, `/` and `css_` prefixes.
    pub fn parse(raw: &str) -> Option<Self> {
        let name = raw.trim();
        let name = name
            .strip_prefix('!')
            .or_else(|| name.strip_prefix('/'))
            .or_else(|| name.strip_prefix("css_"))
            .unwrap_or(name);
        match name.to_ascii_lowercase().as_str() {
            "ws" | "knife" | "gloves" | "agents" => Some(ChatCommand::Refresh),
            "spray" => Some(ChatCommand::Spray),
            "wslogin" => Some(ChatCommand::Login),
            "nocases" => Some(ChatCommand::NoCases),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum CommandOutcome {
    Refresh(RefreshOutcome),
    Spray(SprayOutcome),
    Login(SignInOutcome),
    NoCases { opted_out: bool },
}

pub fn execute(
    engine: &Arc<SyncEngine>,
    host: &mut dyn Host,
    player: PlayerId,
    command: ChatCommand,
) -> CommandOutcome {
    match command {
        ChatCommand::Refresh => CommandOutcome::Refresh(ws_command(engine, host, player)),
        ChatCommand::Spray => CommandOutcome::Spray(spray_command(engine, host, player)),
        ChatCommand::Login => CommandOutcome::Login(wslogin_command(engine, host, player)),
        ChatCommand::NoCases => CommandOutcome::NoCases {
            opted_out: nocases_command(engine, host, player),
        },
    }
}

fn say(host: &mut dyn Host, player: PlayerId, notice: Notice) {
    host.print_to_chat(player, &notice.to_string());
}

/// Always announces the inventory site; then applies the refresh rules.
pub fn ws_command(engine: &Arc<SyncEngine>, host: &mut dyn Host, player: PlayerId) -> RefreshOutcome {
    say(
        host,
        player,
        Notice::Announce {
            url: engine.config().announce_url(),
        },
    );
    let outcome = engine.request_refresh(player);
    match &outcome {
        RefreshOutcome::Cooldown { remaining } => say(
            host,
            player,
            Notice::RefreshCooldown {
                remaining: *remaining,
            },
        ),
        RefreshOutcome::InProgress => say(host, player, Notice::RefreshInProgress),
        RefreshOutcome::Started(_) => say(host, player, Notice::RefreshStarted),
        RefreshOutcome::Disabled | RefreshOutcome::Disconnected => {}
    }
    outcome
}

pub fn spray_command(engine: &Arc<SyncEngine>, host: &mut dyn Host, player: PlayerId) -> SprayOutcome {
    let outcome = engine.try_spray(player, host);
    if let SprayOutcome::Cooldown { remaining } = outcome {
        say(host, player, Notice::SprayCooldown { remaining });
    }
    outcome
}

pub fn wslogin_command(
    engine: &Arc<SyncEngine>,
    host: &mut dyn Host,
    player: PlayerId,
) -> SignInOutcome {
    let outcome = engine.sign_in(player);
    if !matches!(outcome, SignInOutcome::Disabled | SignInOutcome::NotConnected) {
        say(host, player, Notice::LoginInProgress);
    }
    outcome
}

/// Returns `true` when the player is opted out afterwards.
pub fn nocases_command(engine: &Arc<SyncEngine>, host: &mut dyn Host, player: PlayerId) -> bool {
    let opted_out = engine.opt_out().toggle(player);
    info!(target: "invsim::commands", %player, opted_out, "nocases.toggled");
    let notice = if opted_out {
        Notice::NoCasesEnabled
    } else {
        Notice::NoCasesDisabled
    };
    say(host, player, notice);
    opted_out
}
