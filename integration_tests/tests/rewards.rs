mod common;

use std::fs;
use std::sync::Arc;

use common::{engine_with, test_config, RecordingHost, ScriptedApi, T0};
use invsim_core::commands::nocases_command;
use invsim_core::{ManualClock, NoCasesOptOut, PlayerId, RewardOutcome, SyncConfig, SyncEngine};

async fn round_end(engine: &Arc<SyncEngine>, winners: &[PlayerId]) -> Vec<RewardOutcome> {
    let mut outcomes = Vec::new();
    for handle in engine.on_round_end(winners) {
        outcomes.push(handle.await.expect("reward task"));
    }
    outcomes
}

#[tokio::test]
async fn winners_receive_an_item_from_the_configured_list() {
    let api = ScriptedApi::new();
    let clock = Arc::new(ManualClock::at_unix(T0));
    let engine = engine_with(test_config(), &api, &clock);
    let (human, bot, opted) = (PlayerId(1), PlayerId(2), PlayerId(3));
    engine.on_connect(human, false);
    engine.on_connect(bot, true);
    engine.on_connect(opted, false);
    engine.opt_out().toggle(opted);

    let outcomes = round_end(&engine, &[human, bot, opted, PlayerId(4)]).await;
    let item_id = match outcomes[0] {
        RewardOutcome::ItemGranted { item_id } => item_id,
        other => panic!("expected an item, got {other:?}"),
    };
    assert!([4001, 4002, 4003].contains(&item_id));
    assert_eq!(
        &outcomes[1..],
        &[
            RewardOutcome::Bot,
            RewardOutcome::OptedOut,
            RewardOutcome::NotConnected
        ]
    );
    assert_eq!(api.added_items(), vec![(human, item_id)]);
    assert!(api.added_containers().is_empty());

    let mut host = RecordingHost::with_players(&[human]);
    engine.run_main_tasks(&mut host);
    let lines = host.chat_for(human);
    assert!(lines
        .iter()
        .any(|line| line.contains("[test]") && line.contains("received a case")));
    assert_eq!(engine.metrics().snapshot().rewards_granted, 1);
}

#[tokio::test]
async fn empty_or_invalid_list_falls_back_to_a_container() {
    let api = ScriptedApi::new();
    let clock = Arc::new(ManualClock::at_unix(T0));
    let config = SyncConfig {
        roundwin_cases: " abc, -1 ,0".to_string(),
        ..test_config()
    };
    let engine = engine_with(config, &api, &clock);
    engine.on_connect(PlayerId(1), false);

    assert_eq!(
        round_end(&engine, &[PlayerId(1)]).await,
        vec![RewardOutcome::ContainerGranted]
    );
    assert_eq!(api.added_containers(), vec![PlayerId(1)]);
    assert!(api.added_items().is_empty());
}

#[tokio::test]
async fn chance_bounds_are_honoured() {
    let api = ScriptedApi::new();
    let clock = Arc::new(ManualClock::at_unix(T0));
    let never = engine_with(
        SyncConfig {
            roundwin_chance: 0.0,
            ..test_config()
        },
        &api,
        &clock,
    );
    never.on_connect(PlayerId(1), false);
    for _ in 0..20 {
        assert_eq!(
            round_end(&never, &[PlayerId(1)]).await,
            vec![RewardOutcome::Missed]
        );
    }

    let sometimes = engine_with(
        SyncConfig {
            roundwin_chance: 0.5,
            ..test_config()
        },
        &api,
        &clock,
    );
    sometimes.on_connect(PlayerId(1), false);
    let mut granted = 0;
    for _ in 0..200 {
        if matches!(
            round_end(&sometimes, &[PlayerId(1)]).await[0],
            RewardOutcome::ItemGranted { .. }
        ) {
            granted += 1;
        }
    }
    assert!((60..=140).contains(&granted), "granted {granted}");
}

#[tokio::test]
async fn rewards_are_skipped_without_key_or_when_disabled() {
    let api = ScriptedApi::new();
    api.without_api_key();
    let clock = Arc::new(ManualClock::at_unix(T0));
    let engine = engine_with(test_config(), &api, &clock);
    engine.on_connect(PlayerId(1), false);
    assert!(engine.on_round_end(&[PlayerId(1)]).is_empty());
    assert_eq!(
        engine.grant_round_win_reward(PlayerId(1)).await,
        RewardOutcome::NoApiKey
    );

    let keyed = ScriptedApi::new();
    let disabled = engine_with(
        SyncConfig {
            roundwin_enabled: false,
            ..test_config()
        },
        &keyed,
        &clock,
    );
    disabled.on_connect(PlayerId(1), false);
    assert!(disabled.on_round_end(&[PlayerId(1)]).is_empty());
    assert!(keyed.added_items().is_empty());
}

#[tokio::test]
async fn nocases_toggle_persists_and_blocks_rewards() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("configs").join("nocases_steamids.json");
    let api = ScriptedApi::new();
    let clock = Arc::new(ManualClock::at_unix(T0));
    let engine = SyncEngine::builder(
        Arc::new(test_config()),
        Arc::clone(&api) as Arc<dyn invsim_core::InventoryApi>,
    )
    .clock(Arc::clone(&clock) as Arc<dyn invsim_core::Clock>)
    .opt_out(NoCasesOptOut::load(&path))
    .rng_seed(1)
    .build();

    let player = PlayerId(76_561_198_000_000_009);
    engine.on_connect(player, false);
    let mut host = RecordingHost::with_players(&[player]);

    assert!(nocases_command(&engine, &mut host, player));
    assert!(host.chat_for(player)[0].contains("no longer"));
    let stored: Vec<String> = serde_json::from_str(&fs::read_to_string(&path)?)?;
    assert_eq!(stored, vec![player.to_string()]);
    assert_eq!(
        round_end(&engine, &[player]).await,
        vec![RewardOutcome::OptedOut]
    );

    let reloaded = NoCasesOptOut::load(&path);
    assert!(reloaded.is_opted_out(player));

    assert!(!nocases_command(&engine, &mut host, player));
    let stored: Vec<String> = serde_json::from_str(&fs::read_to_string(&path)?)?;
    assert!(stored.is_empty());
    assert!(matches!(
        round_end(&engine, &[player]).await[0],
        RewardOutcome::ItemGranted { .. }
    ));
    Ok(())
}
