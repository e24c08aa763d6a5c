use std::collections::BTreeMap;

use invsim_proto::{fingerprint, EquippedInventory, Fingerprint, WeaponItem, TEAM_CT, TEAM_T};
use rand::Rng;

/// Session-stable wear values for items the remote service sent without an
/// explicit wear, keyed by item uid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WearOverrides {
    by_uid: BTreeMap<i32, f32>,
}

impl WearOverrides {
    /// Roll a wear for every uid-bearing item that has neither an explicit
    /// wear nor a cached override. Existing entries are never replaced.
    fn initialize(&mut self, equipped: &EquippedInventory) {
        let mut rng = rand::thread_rng();
        for item in equipped.weapon_items() {
            if item.wear.is_some() {
                continue;
            }
            if let Some(uid) = item.uid {
                self.by_uid
                    .entry(uid)
                    .or_insert_with(|| rng.gen_range(0.0f32..1.0f32));
            }
        }
    }

    pub fn get(&self, uid: i32) -> Option<f32> {
        self.by_uid.get(&uid).copied()
    }

    pub fn len(&self) -> usize {
        self.by_uid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uid.is_empty()
    }
}

/// Cached inventory of one player: the remote loadout, its fingerprint and
/// the derived wear cache.
#[derive(Debug, Clone, PartialEq)]
pub struct InventorySnapshot {
    equipped: EquippedInventory,
    fingerprint: Fingerprint,
    wear_overrides: WearOverrides,
}

impl InventorySnapshot {
    pub fn new(equipped: EquippedInventory) -> Self {
        let fingerprint = fingerprint(&equipped);
        let mut wear_overrides = WearOverrides::default();
        wear_overrides.initialize(&equipped);
        Self {
            equipped,
            fingerprint,
            wear_overrides,
        }
    }

    pub fn equipped(&self) -> &EquippedInventory {
        &self.equipped
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn wear_overrides(&self) -> &WearOverrides {
        &self.wear_overrides
    }

    /// Carry the previous snapshot's wear cache into this one. Entries from
    /// `previous` win; items new to this snapshot get fresh rolls.
    pub fn merged_with(mut self, previous: &InventorySnapshot) -> Self {
        let mut wear_overrides = previous.wear_overrides.clone();
        wear_overrides.initialize(&self.equipped);
        self.wear_overrides = wear_overrides;
        self
    }

    /// Effective wear for `item`: explicit wear first, then the cached roll.
    pub fn wear_for(&self, item: &WeaponItem) -> Option<f32> {
        item.wear
            .or_else(|| item.uid.and_then(|uid| self.wear_overrides.get(uid)))
    }

    /// Apply `edit` to a copy of the loadout, recomputing the fingerprint.
    /// The wear cache is kept as is.
    pub fn revised<R>(&self, edit: impl FnOnce(&mut EquippedInventory) -> R) -> (Self, R) {
        let mut equipped = self.equipped.clone();
        let result = edit(&mut equipped);
        let revised = Self {
            fingerprint: fingerprint(&equipped),
            equipped,
            wear_overrides: self.wear_overrides.clone(),
        };
        (revised, result)
    }
}

/// Equipment slots that differ between two loadouts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotChanges {
    pub agents: Vec<u8>,
    pub gloves: Vec<u8>,
    pub knives: Vec<u8>,
    pub weapons: Vec<(u8, u16)>,
    pub music_kit: bool,
    pub graffiti: bool,
    pub pin: bool,
}

impl SlotChanges {
    /// Diff `current` against `previous`. With no previous loadout every
    /// occupied slot counts as changed.
    pub fn between(previous: Option<&EquippedInventory>, current: &EquippedInventory) -> Self {
        let empty = EquippedInventory::default();
        let previous = previous.unwrap_or(&empty);
        let mut changes = SlotChanges {
            music_kit: previous.music_kit != current.music_kit,
            graffiti: previous.graffiti != current.graffiti,
            pin: previous.pin != current.pin,
            ..Default::default()
        };

        for team in [TEAM_T, TEAM_CT] {
            if previous.agents.get(&team) != current.agents.get(&team) {
                changes.agents.push(team);
            }
            if previous.gloves.get(&team) != current.gloves.get(&team) {
                changes.gloves.push(team);
            }
            if previous.knives.get(&team) != current.knives.get(&team) {
                changes.knives.push(team);
            }

            let before = previous.weapons(team);
            let after = current.weapons(team);
            let mut defs: Vec<u16> = before.keys().chain(after.keys()).copied().collect();
            defs.sort_unstable();
            defs.dedup();
            for def in defs {
                if before.get(&def) != after.get(&def) {
                    changes.weapons.push((team, def));
                }
            }
        }

        changes
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
            && self.gloves.is_empty()
            && self.knives.is_empty()
            && self.weapons.is_empty()
            && !self.music_kit
            && !self.graffiti
            && !self.pin
    }
}
