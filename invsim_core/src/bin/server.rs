use std::collections::BTreeSet;
use std::io::{BufRead, BufReader};
use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::{unbounded, Receiver, Sender};
use invsim_proto::{GraffitiItem, TEAM_CT, TEAM_T};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use invsim_core::commands::{self, ChatCommand};
use invsim_core::{
    load_sync_config_from_env, Host, HttpInventoryApi, InventorySnapshot, PlayerId, SlotChanges,
    StatTrakTarget, SyncConfig, SyncDrivers, SyncEngine,
};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Headless harness that drives the sync engine from line commands.
#[derive(Debug, Parser)]
#[command(name = "invsim_server")]
struct Args {
    /// Address of the line-based command listener.
    #[arg(long, default_value = "127.0.0.1:41010")]
    command_bind: SocketAddr,
    /// JSON config file. Defaults to `INVSIM_CONFIG_PATH`, then the builtin.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = match args.config.as_deref() {
        Some(path) => match SyncConfig::from_file(path) {
            Ok(config) => Arc::new(config),
            Err(err) => {
                error!(target: "invsim::server", error = %err, "config.load_failed");
                return ExitCode::FAILURE;
            }
        },
        None => load_sync_config_from_env(),
    };

    let api = match HttpInventoryApi::from_config(&config) {
        Ok(api) => Arc::new(api),
        Err(err) => {
            error!(target: "invsim::server", error = %err, "api.init_failed");
            return ExitCode::FAILURE;
        }
    };
    let engine = SyncEngine::builder(Arc::clone(&config), api).build();
    let _drivers = SyncDrivers::start(&engine);

    let command_rx = match spawn_command_listener(args.command_bind) {
        Ok(receiver) => receiver,
        Err(err) => {
            error!(
                target: "invsim::server",
                command_bind = %args.command_bind,
                error = %err,
                "command_listener.bind_failed"
            );
            return ExitCode::FAILURE;
        }
    };

    info!(
        target: "invsim::server",
        command_bind = %args.command_bind,
        url = %config.url,
        "invsim headless server ready"
    );

    let mut host = ConsoleHost::default();
    let mut frame = interval(FRAME_INTERVAL);
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut broadcast = interval(config.broadcast_interval());
    broadcast.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = frame.tick() => {
                while let Ok(command) = command_rx.try_recv() {
                    handle_command(&engine, &mut host, command);
                }
                engine.run_main_tasks(&mut host);
            }
            _ = broadcast.tick() => {
                engine.drain_broadcast(&mut host);
            }
        }
    }
}

#[derive(Debug)]
enum Command {
    Connect { player: PlayerId, bot: bool },
    Disconnect { player: PlayerId },
    Chat { player: PlayerId, command: ChatCommand },
    RoundWin { winners: Vec<PlayerId> },
    Mvp { player: PlayerId },
    Kill {
        attacker: PlayerId,
        team: u8,
        def: u16,
        victim_is_bot: bool,
    },
    ReloadFile,
    Metrics,
}

fn handle_command(engine: &Arc<SyncEngine>, host: &mut ConsoleHost, command: Command) {
    match command {
        Command::Connect { player, bot } => {
            host.connected.insert(player);
            engine.on_connect(player, bot);
        }
        Command::Disconnect { player } => {
            host.connected.remove(&player);
            engine.on_disconnect(player);
        }
        Command::Chat { player, command } => {
            let outcome = commands::execute(engine, host, player, command);
            info!(target: "invsim::server", %player, outcome = ?outcome, "command.applied");
        }
        Command::RoundWin { winners } => {
            let spawned = engine.on_round_end(&winners).len();
            info!(target: "invsim::server", winners = winners.len(), spawned, "round.ended");
        }
        Command::Mvp { player } => {
            let count = engine.on_round_mvp(player);
            info!(target: "invsim::server", %player, count = ?count, "round.mvp");
        }
        Command::Kill {
            attacker,
            team,
            def,
            victim_is_bot,
        } => {
            let target = if def == 0 {
                StatTrakTarget::Knife { team }
            } else {
                StatTrakTarget::Weapon { team, def }
            };
            let count = engine.on_player_kill(attacker, victim_is_bot, target);
            info!(target: "invsim::server", %attacker, count = ?count, "player.kill");
        }
        Command::ReloadFile => match engine.reload_configured_inventory_file() {
            Ok(reassigned) => {
                info!(target: "invsim::server", reassigned, "inventory_file.reloaded")
            }
            Err(err) => warn!(target: "invsim::server", error = %err, "inventory_file.rejected"),
        },
        Command::Metrics => {
            let metrics = engine.metrics().snapshot();
            info!(target: "invsim::server", metrics = ?metrics, "metrics.snapshot");
        }
    }
}

/// Host that logs every effect instead of touching a game.
#[derive(Debug, Default)]
struct ConsoleHost {
    connected: BTreeSet<PlayerId>,
}

impl Host for ConsoleHost {
    fn is_connected(&self, player: PlayerId) -> bool {
        self.connected.contains(&player)
    }

    fn print_to_chat(&mut self, player: PlayerId, message: &str) {
        info!(target: "invsim::server", %player, line = message, "chat.print");
    }

    fn send_inventory_update(&mut self, player: PlayerId, snapshot: Option<&InventorySnapshot>) {
        let fingerprint = snapshot.map(|snapshot| snapshot.fingerprint().to_string());
        info!(target: "invsim::server", %player, fingerprint = ?fingerprint, "inventory.sent");
    }

    fn regive(&mut self, player: PlayerId, snapshot: &InventorySnapshot, changes: &SlotChanges) {
        info!(
            target: "invsim::server",
            %player,
            fingerprint = %snapshot.fingerprint(),
            weapons = changes.weapons.len(),
            knives = changes.knives.len(),
            gloves = changes.gloves.len(),
            agents = changes.agents.len(),
            "inventory.regiven"
        );
    }

    fn apply_spray(&mut self, player: PlayerId, graffiti: &GraffitiItem) {
        info!(
            target: "invsim::server",
            %player,
            def = ?graffiti.def,
            tint = ?graffiti.tint,
            "spray.placed"
        );
    }
}

fn spawn_command_listener(bind_addr: SocketAddr) -> std::io::Result<Receiver<Command>> {
    let listener = TcpListener::bind(bind_addr)?;
    listener.set_nonblocking(true)?;

    let (sender, receiver) = unbounded::<Command>();
    thread::spawn(move || loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                info!(target: "invsim::server", %addr, "command_client.connected");
                let sender = sender.clone();
                thread::spawn(move || handle_client(stream, sender));
            }
            Err(ref err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(err) => {
                warn!(target: "invsim::server", error = %err, "command_client.accept_failed");
                thread::sleep(Duration::from_millis(200));
            }
        }
    });

    Ok(receiver)
}

fn handle_client(stream: std::net::TcpStream, sender: Sender<Command>) {
    // Accepted sockets inherit non-blocking mode on some platforms.
    if let Err(err) = stream.set_nonblocking(false) {
        warn!(target: "invsim::server", error = %err, "command_client.setup_failed");
        return;
    }
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match parse_command(trimmed) {
                    Some(command) => {
                        if sender.send(command).is_err() {
                            break;
                        }
                    }
                    None => warn!(target: "invsim::server", line = trimmed, "command.invalid"),
                }
            }
            Err(err) => {
                warn!(target: "invsim::server", error = %err, "command_client.read_failed");
                break;
            }
        }
    }
}

fn parse_player(raw: Option<&str>) -> Option<PlayerId> {
    raw?.parse().ok().map(PlayerId)
}

fn parse_team(raw: &str) -> Option<u8> {
    match raw {
        "t" | "T" => Some(TEAM_T),
        "ct" | "CT" => Some(TEAM_CT),
        other => other.parse().ok(),
    }
}

fn parse_command(input: &str) -> Option<Command> {
    let mut parts = input.split_whitespace();
    match parts.next()? {
        "connect" => {
            let player = parse_player(parts.next())?;
            let bot = parts.next() == Some("bot");
            Some(Command::Connect { player, bot })
        }
        "disconnect" => Some(Command::Disconnect {
            player: parse_player(parts.next())?,
        }),
        "roundwin" => {
            let winners: Option<Vec<PlayerId>> =
                parts.map(|raw| parse_player(Some(raw))).collect();
            Some(Command::RoundWin { winners: winners? })
        }
        "mvp" => Some(Command::Mvp {
            player: parse_player(parts.next())?,
        }),
        "kill" => {
            let attacker = parse_player(parts.next())?;
            let team = parse_team(parts.next()?)?;
            let def: u16 = parts.next()?.parse().ok()?;
            let victim_is_bot = parts.next() == Some("bot");
            Some(Command::Kill {
                attacker,
                team,
                def,
                victim_is_bot,
            })
        }
        "reload_file" => Some(Command::ReloadFile),
        "metrics" => Some(Command::Metrics),
        other => {
            let command = ChatCommand::parse(other)?;
            let player = parse_player(parts.next())?;
            Some(Command::Chat { player, command })
        }
    }
}
