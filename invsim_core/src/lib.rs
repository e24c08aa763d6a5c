//! Inventory synchronization and polling engine.
//!
//! Keeps each connected player's remote loadout cached in process, detects
//! remote changes, polls recent case openings and trade-ups in rate-limited
//! batches and throttles the resulting chat broadcasts. The game server is
//! reached only through the [`Host`] trait and the remote service only
//! through [`InventoryApi`].

mod auto_reload;
pub mod broadcast;
pub mod clock;
pub mod commands;
pub mod config;
pub mod drivers;
mod engine;
mod fetch;
pub mod file_inventories;
pub mod host;
pub mod metrics;
pub mod notice;
pub mod opt_out;
mod poll;
pub mod remote;
mod reward;
mod sign_in;
pub mod snapshot;
mod spray;
pub mod state;
mod stattrak;
pub mod weighted;

pub use auto_reload::AutoReloadOutcome;
pub use broadcast::BroadcastQueue;
pub use clock::{Clock, ManualClock, SystemClock};
pub use commands::{ChatCommand, CommandOutcome};
pub use config::{load_sync_config_from_env, SyncConfig, SyncConfigError};
pub use drivers::SyncDrivers;
pub use engine::{SyncEngine, SyncEngineBuilder};
pub use fetch::{FetchOutcome, RefreshOutcome};
pub use file_inventories::{FileInventories, FileInventoryError};
pub use host::{Host, MainTask, MainTaskQueue};
pub use metrics::{SyncMetrics, SyncMetricsSnapshot};
pub use notice::{rarity_color, Notice};
pub use opt_out::{NoCasesOptOut, PersistenceError};
pub use poll::{PollScheduler, PollVerdict};
pub use remote::{HttpInventoryApi, InventoryApi, RemoteError};
pub use reward::RewardOutcome;
pub use sign_in::SignInOutcome;
pub use snapshot::{InventorySnapshot, SlotChanges, WearOverrides};
pub use spray::SprayOutcome;
pub use state::{
    EntityRegistry, EntitySyncState, EventKind, EventVerdict, Flight, FlightGuard, PlayerId,
    SyncEntry,
};
pub use stattrak::StatTrakTarget;
pub use weighted::WeightedSelector;
