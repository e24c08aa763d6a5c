use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Team index used by the remote service for terrorist-side loadouts.
pub const TEAM_T: u8 = 2;
/// Team index used by the remote service for counter-terrorist-side loadouts.
pub const TEAM_CT: u8 = 3;

pub fn other_team(team: u8) -> u8 {
    if team == TEAM_T {
        TEAM_CT
    } else {
        TEAM_T
    }
}

/// Equipped loadout of one user as returned by the remote service.
///
/// Every map is ordered so that encoding the value is deterministic; the
/// fingerprint relies on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EquippedInventory {
    pub agents: BTreeMap<u8, AgentItem>,
    pub gloves: BTreeMap<u8, WeaponItem>,
    pub knives: BTreeMap<u8, WeaponItem>,
    pub t_weapons: BTreeMap<u16, WeaponItem>,
    pub ct_weapons: BTreeMap<u16, WeaponItem>,
    pub music_kit: Option<MusicKitItem>,
    pub graffiti: Option<GraffitiItem>,
    pub pin: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WeaponItem {
    pub def: Option<u16>,
    pub paint: Option<u32>,
    pub seed: Option<u32>,
    pub wear: Option<f32>,
    pub stattrak: Option<i32>,
    pub nametag: Option<String>,
    pub uid: Option<i32>,
    pub stickers: Vec<StickerItem>,
    pub keychains: Vec<KeychainItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StickerItem {
    pub def: u32,
    pub slot: u8,
    pub wear: Option<f32>,
    pub rotation: Option<f32>,
    pub x: Option<f32>,
    pub y: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KeychainItem {
    pub def: u32,
    pub seed: Option<u32>,
    pub x: Option<f32>,
    pub y: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentItem {
    pub def: Option<u16>,
    pub model: Option<String>,
    pub patches: Vec<u32>,
    pub uid: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MusicKitItem {
    pub def: Option<u16>,
    pub stattrak: Option<i32>,
    pub uid: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraffitiItem {
    pub def: Option<u32>,
    pub tint: Option<u32>,
}

impl EquippedInventory {
    pub fn weapons(&self, team: u8) -> &BTreeMap<u16, WeaponItem> {
        if team == TEAM_T {
            &self.t_weapons
        } else {
            &self.ct_weapons
        }
    }

    fn weapons_mut(&mut self, team: u8) -> &mut BTreeMap<u16, WeaponItem> {
        if team == TEAM_T {
            &mut self.t_weapons
        } else {
            &mut self.ct_weapons
        }
    }

    /// Weapon equipped for `team` with definition index `def`, optionally
    /// falling back to the other team's loadout.
    pub fn weapon(&self, team: u8, def: u16, fallback: bool) -> Option<&WeaponItem> {
        self.weapons(team)
            .get(&def)
            .or_else(|| fallback.then(|| self.weapons(other_team(team)).get(&def)).flatten())
    }

    pub fn weapon_mut(&mut self, team: u8, def: u16, fallback: bool) -> Option<&mut WeaponItem> {
        let team = if self.weapons(team).contains_key(&def) {
            team
        } else if fallback && self.weapons(other_team(team)).contains_key(&def) {
            other_team(team)
        } else {
            return None;
        };
        self.weapons_mut(team).get_mut(&def)
    }

    pub fn knife(&self, team: u8, fallback: bool) -> Option<&WeaponItem> {
        self.knives
            .get(&team)
            .or_else(|| fallback.then(|| self.knives.get(&other_team(team))).flatten())
    }

    pub fn knife_mut(&mut self, team: u8, fallback: bool) -> Option<&mut WeaponItem> {
        let team = if self.knives.contains_key(&team) {
            team
        } else if fallback && self.knives.contains_key(&other_team(team)) {
            other_team(team)
        } else {
            return None;
        };
        self.knives.get_mut(&team)
    }

    /// All weapon-like items (weapons, knives, gloves) in a stable order.
    pub fn weapon_items(&self) -> impl Iterator<Item = &WeaponItem> {
        self.t_weapons
            .values()
            .chain(self.ct_weapons.values())
            .chain(self.knives.values())
            .chain(self.gloves.values())
    }
}
