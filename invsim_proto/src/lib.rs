use std::collections::BTreeMap;
use std::fmt;
use std::hash::{BuildHasher, Hasher};

use ahash::RandomState;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

mod equipped;

pub use equipped::{
    other_team, AgentItem, EquippedInventory, GraffitiItem, KeychainItem, MusicKitItem,
    StickerItem, WeaponItem, TEAM_CT, TEAM_T,
};

/// Opaque content digest of an [`EquippedInventory`]. Only ever compared for
/// equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub u64);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

pub fn fingerprint(inventory: &EquippedInventory) -> Fingerprint {
    let encoded = bincode::serialize(inventory).expect("inventory serialization for hashing");
    let mut hasher = RandomState::with_seeds(0, 0, 0, 0).build_hasher();
    hasher.write(&encoded);
    Fingerprint(hasher.finish())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastCaseOpening {
    pub user_name: String,
    pub case_name: String,
    pub unlocked_item_name: String,
    #[serde(default)]
    pub opened_at: Option<String>,
    #[serde(default)]
    pub rarity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastTradeUp {
    pub user_name: String,
    pub output_item_name: String,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub rarity: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub api_key: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SignInResponse {
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatTrakIncrementRequest {
    pub api_key: String,
    pub target_uid: i32,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddItemInventoryItem {
    pub id: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub api_key: String,
    pub user_id: String,
    pub inventory_item: AddItemInventoryItem,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddContainerRequest {
    pub api_key: String,
    pub user_id: String,
    pub weapon: bool,
}

/// Parse a remote event timestamp.
///
/// The service emits round-trippable ISO-8601 strings. Values with an offset
/// are normalised to UTC; values without one are taken to be UTC already.
pub fn parse_event_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub fn decode_equipped_json(data: &str) -> serde_json::Result<EquippedInventory> {
    serde_json::from_str(data)
}

pub fn encode_equipped_json(inventory: &EquippedInventory) -> serde_json::Result<String> {
    serde_json::to_string(inventory)
}

/// Decode a static inventory file: a JSON object keyed by user id.
pub fn decode_inventory_file_json(
    data: &str,
) -> serde_json::Result<BTreeMap<String, EquippedInventory>> {
    serde_json::from_str(data)
}
