#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use invsim_core::{
    Host, InventoryApi, InventorySnapshot, ManualClock, NoCasesOptOut, PlayerId, RemoteError,
    SlotChanges, SyncConfig, SyncEngine,
};
use invsim_proto::{
    EquippedInventory, GraffitiItem, LastCaseOpening, LastTradeUp, SignInResponse, WeaponItem,
    TEAM_CT,
};
use tokio::sync::Semaphore;

pub const T0: i64 = 1_700_000_000;

pub fn test_config() -> SyncConfig {
    let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("test_sync_config.json");
    SyncConfig::from_file(&config_path).expect("test sync config should load")
}

pub fn engine_with(
    config: SyncConfig,
    api: &Arc<ScriptedApi>,
    clock: &Arc<ManualClock>,
) -> Arc<SyncEngine> {
    SyncEngine::builder(Arc::new(config), Arc::clone(api) as Arc<dyn InventoryApi>)
        .clock(Arc::clone(clock) as Arc<dyn invsim_core::Clock>)
        .opt_out(NoCasesOptOut::in_memory())
        .rng_seed(7)
        .build()
}

pub fn rfc3339(unix: i64) -> String {
    Utc.timestamp_opt(unix, 0)
        .single()
        .expect("valid timestamp")
        .to_rfc3339()
}

pub fn loadout(ak_paint: u32) -> EquippedInventory {
    let mut equipped = EquippedInventory::default();
    equipped.t_weapons.insert(
        7,
        WeaponItem {
            def: Some(7),
            paint: Some(ak_paint),
            uid: Some(100),
            stattrak: Some(10),
            ..Default::default()
        },
    );
    equipped.ct_weapons.insert(
        16,
        WeaponItem {
            def: Some(16),
            paint: Some(309),
            uid: Some(101),
            ..Default::default()
        },
    );
    equipped.knives.insert(
        TEAM_CT,
        WeaponItem {
            def: Some(507),
            paint: Some(38),
            uid: Some(102),
            stattrak: Some(0),
            ..Default::default()
        },
    );
    equipped.graffiti = Some(GraffitiItem {
        def: Some(1),
        tint: Some(4),
    });
    equipped
}

pub fn case_opening(user: &str, item: &str, opened_at: Option<String>) -> LastCaseOpening {
    LastCaseOpening {
        user_name: user.to_string(),
        case_name: "Kilowatt Case".to_string(),
        unlocked_item_name: item.to_string(),
        opened_at,
        rarity: Some("covert".to_string()),
    }
}

/// In-memory remote service with call counters.
#[derive(Default)]
pub struct ScriptedApi {
    no_api_key: AtomicBool,
    equipped: Mutex<HashMap<PlayerId, EquippedInventory>>,
    fail_equipped: AtomicBool,
    case_openings: Mutex<HashMap<PlayerId, LastCaseOpening>>,
    trade_ups: Mutex<HashMap<PlayerId, LastTradeUp>>,
    sign_in_token: Mutex<Option<String>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    equipped_calls: AtomicUsize,
    polled_case_openings: Mutex<Vec<PlayerId>>,
    polled_trade_ups: Mutex<Vec<PlayerId>>,
    added_items: Mutex<Vec<(PlayerId, u32)>>,
    added_containers: Mutex<Vec<PlayerId>>,
    stattrak_reports: Mutex<Vec<(PlayerId, i32)>>,
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn without_api_key(&self) {
        self.no_api_key.store(true, Ordering::SeqCst);
    }

    pub fn set_equipped(&self, player: PlayerId, equipped: EquippedInventory) {
        self.equipped.lock().unwrap().insert(player, equipped);
    }

    pub fn fail_equipped(&self, fail: bool) {
        self.fail_equipped.store(fail, Ordering::SeqCst);
    }

    pub fn set_case_opening(&self, player: PlayerId, opening: LastCaseOpening) {
        self.case_openings.lock().unwrap().insert(player, opening);
    }

    pub fn set_trade_up(&self, player: PlayerId, trade_up: LastTradeUp) {
        self.trade_ups.lock().unwrap().insert(player, trade_up);
    }

    pub fn set_sign_in_token(&self, token: &str) {
        *self.sign_in_token.lock().unwrap() = Some(token.to_string());
    }

    /// Hold every equipped fetch until permits are added to the returned
    /// semaphore.
    pub fn close_gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn equipped_calls(&self) -> usize {
        self.equipped_calls.load(Ordering::SeqCst)
    }

    pub fn polled_case_openings(&self) -> Vec<PlayerId> {
        self.polled_case_openings.lock().unwrap().clone()
    }

    pub fn polled_trade_ups(&self) -> Vec<PlayerId> {
        self.polled_trade_ups.lock().unwrap().clone()
    }

    pub fn clear_polled(&self) {
        self.polled_case_openings.lock().unwrap().clear();
        self.polled_trade_ups.lock().unwrap().clear();
    }

    pub fn added_items(&self) -> Vec<(PlayerId, u32)> {
        self.added_items.lock().unwrap().clone()
    }

    pub fn added_containers(&self) -> Vec<PlayerId> {
        self.added_containers.lock().unwrap().clone()
    }

    pub fn stattrak_reports(&self) -> Vec<(PlayerId, i32)> {
        self.stattrak_reports.lock().unwrap().clone()
    }

    fn require_key(&self, call: &'static str) -> Result<(), RemoteError> {
        if self.no_api_key.load(Ordering::SeqCst) {
            Err(RemoteError::MissingApiKey(call))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl InventoryApi for ScriptedApi {
    fn has_api_key(&self) -> bool {
        !self.no_api_key.load(Ordering::SeqCst)
    }

    async fn fetch_equipped(
        &self,
        player: PlayerId,
    ) -> Result<Option<EquippedInventory>, RemoteError> {
        self.equipped_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await.expect("gate semaphore closed");
        }
        if self.fail_equipped.load(Ordering::SeqCst) {
            return Err(RemoteError::Status {
                path: format!("/api/equipped/v4/{player}.json"),
                status: 503,
            });
        }
        Ok(self.equipped.lock().unwrap().get(&player).cloned())
    }

    async fn fetch_last_case_opening(
        &self,
        player: PlayerId,
    ) -> Result<Option<LastCaseOpening>, RemoteError> {
        self.polled_case_openings.lock().unwrap().push(player);
        Ok(self.case_openings.lock().unwrap().get(&player).cloned())
    }

    async fn fetch_last_trade_up(
        &self,
        player: PlayerId,
    ) -> Result<Option<LastTradeUp>, RemoteError> {
        self.polled_trade_ups.lock().unwrap().push(player);
        Ok(self.trade_ups.lock().unwrap().get(&player).cloned())
    }

    async fn send_sign_in(&self, _player: PlayerId) -> Result<Option<SignInResponse>, RemoteError> {
        self.require_key("sign-in")?;
        Ok(self
            .sign_in_token
            .lock()
            .unwrap()
            .clone()
            .map(|token| SignInResponse { token }))
    }

    async fn send_stat_trak_increment(
        &self,
        player: PlayerId,
        target_uid: i32,
    ) -> Result<(), RemoteError> {
        self.require_key("increment-item-stattrak")?;
        self.stattrak_reports.lock().unwrap().push((player, target_uid));
        Ok(())
    }

    async fn send_add_item(&self, player: PlayerId, item_id: u32) -> Result<(), RemoteError> {
        self.require_key("add-item")?;
        self.added_items.lock().unwrap().push((player, item_id));
        Ok(())
    }

    async fn send_add_container(&self, player: PlayerId) -> Result<(), RemoteError> {
        self.require_key("add-container")?;
        self.added_containers.lock().unwrap().push(player);
        Ok(())
    }
}

/// Host that records every effect it is asked to apply.
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub connected: BTreeSet<PlayerId>,
    pub chat: Vec<(PlayerId, String)>,
    pub inventory_updates: Vec<PlayerId>,
    pub regives: Vec<(PlayerId, SlotChanges)>,
    pub sprays: Vec<(PlayerId, GraffitiItem)>,
}

impl RecordingHost {
    pub fn with_players(players: &[PlayerId]) -> Self {
        Self {
            connected: players.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn chat_for(&self, player: PlayerId) -> Vec<&str> {
        self.chat
            .iter()
            .filter(|(recipient, _)| *recipient == player)
            .map(|(_, line)| line.as_str())
            .collect()
    }
}

impl Host for RecordingHost {
    fn is_connected(&self, player: PlayerId) -> bool {
        self.connected.contains(&player)
    }

    fn print_to_chat(&mut self, player: PlayerId, message: &str) {
        self.chat.push((player, message.to_string()));
    }

    fn send_inventory_update(&mut self, player: PlayerId, _snapshot: Option<&InventorySnapshot>) {
        self.inventory_updates.push(player);
    }

    fn regive(&mut self, player: PlayerId, _snapshot: &InventorySnapshot, changes: &SlotChanges) {
        self.regives.push((player, changes.clone()));
    }

    fn apply_spray(&mut self, player: PlayerId, graffiti: &GraffitiItem) {
        self.sprays.push((player, graffiti.clone()));
    }
}

/// Yield to spawned tasks until `done` holds or the attempts run out.
pub async fn settle(mut done: impl FnMut() -> bool) -> bool {
    for _ in 0..1_000 {
        if done() {
            return true;
        }
        tokio::task::yield_now().await;
    }
    done()
}
