mod common;

use std::sync::Arc;

use common::{engine_with, loadout, settle, test_config, RecordingHost, ScriptedApi, T0};
use invsim_core::commands::ws_command;
use invsim_core::{FetchOutcome, ManualClock, PlayerId, RefreshOutcome, SyncConfig};

const PLAYER: PlayerId = PlayerId(76_561_198_000_000_001);

#[tokio::test]
async fn concurrent_fetches_issue_one_remote_call() {
    let api = ScriptedApi::new();
    api.set_equipped(PLAYER, loadout(44));
    let gate = api.close_gate();
    let clock = Arc::new(ManualClock::at_unix(T0));
    let engine = engine_with(test_config(), &api, &clock);

    let first = engine.on_connect(PLAYER, false).expect("fetch spawned");
    assert!(settle(|| api.equipped_calls() == 1).await);

    assert_eq!(
        engine.ensure_fetched(PLAYER, true).await,
        FetchOutcome::AlreadyInFlight
    );
    assert_eq!(
        engine.ensure_fetched(PLAYER, false).await,
        FetchOutcome::AlreadyInFlight
    );

    gate.add_permits(1);
    let outcome = first.await.expect("fetch task");
    assert_eq!(outcome, FetchOutcome::Fetched { previous: None });
    assert_eq!(api.equipped_calls(), 1);

    assert_eq!(engine.ensure_fetched(PLAYER, false).await, FetchOutcome::Cached);
    assert_eq!(api.equipped_calls(), 1);

    let entry = engine.registry().lookup(PLAYER).expect("registered");
    assert!(entry.read(|state| state.has_snapshot() && state.last_refresh_at() == T0));
}

#[tokio::test]
async fn fetch_completion_signals_listeners() {
    let api = ScriptedApi::new();
    api.set_equipped(PLAYER, loadout(44));
    let clock = Arc::new(ManualClock::at_unix(T0));
    let engine = engine_with(test_config(), &api, &clock);

    let entry = engine.registry().get(PLAYER);
    let mut fetches = entry.subscribe_fetches();
    assert!(matches!(
        engine.ensure_fetched(PLAYER, false).await,
        FetchOutcome::Fetched { .. }
    ));
    assert!(fetches.has_changed().expect("sender alive"));
    fetches.borrow_and_update();

    api.fail_equipped(true);
    assert_eq!(engine.ensure_fetched(PLAYER, true).await, FetchOutcome::Failed);
    assert!(fetches.has_changed().expect("sender alive"));
}

#[tokio::test]
async fn failed_fetch_keeps_previous_snapshot() {
    let api = ScriptedApi::new();
    api.set_equipped(PLAYER, loadout(44));
    let clock = Arc::new(ManualClock::at_unix(T0));
    let engine = engine_with(test_config(), &api, &clock);
    engine
        .on_connect(PLAYER, false)
        .expect("fetch spawned")
        .await
        .expect("fetch task");

    let entry = engine.registry().lookup(PLAYER).expect("registered");
    let before = entry.read(|state| state.fingerprint());

    api.fail_equipped(true);
    clock.advance_secs(60);
    assert_eq!(engine.ensure_fetched(PLAYER, true).await, FetchOutcome::Failed);
    assert_eq!(entry.read(|state| state.fingerprint()), before);
    assert_eq!(entry.read(|state| state.last_refresh_at()), T0);
    assert!(!entry.in_flight(invsim_core::Flight::Fetch));

    // An empty response is a failure too.
    api.fail_equipped(false);
    engine.registry().get(PlayerId(3));
    assert_eq!(engine.ensure_fetched(PlayerId(3), false).await, FetchOutcome::Failed);
    assert_eq!(engine.metrics().snapshot().fetches_failed, 2);
}

#[tokio::test]
async fn refresh_command_respects_cooldown_then_completes() {
    let api = ScriptedApi::new();
    api.set_equipped(PLAYER, loadout(44));
    let clock = Arc::new(ManualClock::at_unix(T0));
    let engine = engine_with(test_config(), &api, &clock);
    let mut host = RecordingHost::with_players(&[PLAYER]);

    engine
        .on_connect(PLAYER, false)
        .expect("fetch spawned")
        .await
        .expect("fetch task");
    assert_eq!(engine.run_main_tasks(&mut host), 1);
    assert_eq!(host.inventory_updates, vec![PLAYER]);
    assert_eq!(api.equipped_calls(), 1);

    clock.advance_secs(5);
    let outcome = ws_command(&engine, &mut host, PLAYER);
    assert!(matches!(outcome, RefreshOutcome::Cooldown { remaining: 25 }));
    let lines = host.chat_for(PLAYER);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("inventory.test"));
    assert!(lines[1].contains("25 second(s)"));
    assert_eq!(api.equipped_calls(), 1);

    api.set_equipped(PLAYER, loadout(180));
    clock.advance_secs(26);
    let handle = match ws_command(&engine, &mut host, PLAYER) {
        RefreshOutcome::Started(handle) => handle,
        other => panic!("expected a started refresh, got {other:?}"),
    };
    let outcome = handle.await.expect("refresh task");
    assert!(matches!(outcome, FetchOutcome::Fetched { previous: Some(_) }));
    assert_eq!(api.equipped_calls(), 2);

    host.chat.clear();
    assert_eq!(engine.run_main_tasks(&mut host), 1);
    let lines = host.chat_for(PLAYER);
    assert_eq!(lines, vec!["{lime}Your inventory has been refreshed."]);
    assert_eq!(host.regives.len(), 1);
    assert_eq!(host.regives[0].1.weapons, vec![(invsim_proto::TEAM_T, 7)]);

    let entry = engine.registry().lookup(PLAYER).expect("registered");
    assert_eq!(entry.read(|state| state.last_refresh_at()), T0 + 31);
}

#[tokio::test]
async fn refresh_command_reports_in_flight_fetch() {
    let api = ScriptedApi::new();
    api.set_equipped(PLAYER, loadout(44));
    let gate = api.close_gate();
    let clock = Arc::new(ManualClock::at_unix(T0));
    let engine = engine_with(test_config(), &api, &clock);
    let mut host = RecordingHost::with_players(&[PLAYER]);

    let first = engine.on_connect(PLAYER, false).expect("fetch spawned");
    assert!(settle(|| api.equipped_calls() == 1).await);
    assert!(matches!(
        ws_command(&engine, &mut host, PLAYER),
        RefreshOutcome::InProgress
    ));
    assert!(host.chat_for(PLAYER)[1].contains("already being refreshed"));

    gate.add_permits(1);
    first.await.expect("fetch task");
}

#[tokio::test]
async fn disabled_refresh_only_announces() {
    let api = ScriptedApi::new();
    let clock = Arc::new(ManualClock::at_unix(T0));
    let config = SyncConfig {
        ws_enabled: false,
        ..test_config()
    };
    let engine = engine_with(config, &api, &clock);
    let mut host = RecordingHost::with_players(&[PLAYER]);
    engine.registry().get(PLAYER);

    assert!(matches!(
        ws_command(&engine, &mut host, PLAYER),
        RefreshOutcome::Disabled
    ));
    assert_eq!(host.chat_for(PLAYER).len(), 1);
    assert_eq!(api.equipped_calls(), 0);
}

#[tokio::test]
async fn completion_after_disconnect_is_discarded() {
    let api = ScriptedApi::new();
    api.set_equipped(PLAYER, loadout(44));
    let gate = api.close_gate();
    let clock = Arc::new(ManualClock::at_unix(T0));
    let engine = engine_with(test_config(), &api, &clock);
    let mut host = RecordingHost::with_players(&[PLAYER]);

    let pending = engine.on_connect(PLAYER, false).expect("fetch spawned");
    assert!(settle(|| api.equipped_calls() == 1).await);
    let stale = engine.registry().lookup(PLAYER).expect("registered");

    engine.on_disconnect(PLAYER);
    host.connected.remove(&PLAYER);
    gate.add_permits(1);

    assert_eq!(pending.await.expect("fetch task"), FetchOutcome::Disconnected);
    assert!(!stale.read(|state| state.has_snapshot()));
    assert!(engine.registry().lookup(PLAYER).is_none());
    assert_eq!(engine.run_main_tasks(&mut host), 0);
    assert!(host.inventory_updates.is_empty());
}

#[tokio::test]
async fn tasks_for_a_replaced_entry_are_dropped() {
    let api = ScriptedApi::new();
    api.set_equipped(PLAYER, loadout(44));
    let clock = Arc::new(ManualClock::at_unix(T0));
    let engine = engine_with(test_config(), &api, &clock);
    let mut host = RecordingHost::with_players(&[PLAYER]);

    engine
        .on_connect(PLAYER, false)
        .expect("fetch spawned")
        .await
        .expect("fetch task");
    // Reconnect before the first session's task reaches the main context.
    engine.on_disconnect(PLAYER);
    engine
        .on_connect(PLAYER, false)
        .expect("fetch spawned")
        .await
        .expect("fetch task");

    assert_eq!(engine.main_tasks().len(), 2);
    assert_eq!(engine.run_main_tasks(&mut host), 1);
    assert_eq!(host.inventory_updates, vec![PLAYER]);
}
