use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use invsim_proto::{decode_inventory_file_json, EquippedInventory};
use thiserror::Error;

use crate::state::PlayerId;

#[derive(Debug, Error)]
pub enum FileInventoryError {
    #[error("failed to read inventory file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse inventory file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Loadouts served from a local JSON file instead of the remote service.
/// Keys that are not numeric player ids are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileInventories {
    by_player: BTreeMap<PlayerId, EquippedInventory>,
}

impl FileInventories {
    pub fn from_json_str(json: &str) -> Result<Self, FileInventoryError> {
        let raw = decode_inventory_file_json(json)?;
        let by_player = raw
            .into_iter()
            .filter_map(|(key, inventory)| {
                key.trim()
                    .parse::<u64>()
                    .ok()
                    .map(|id| (PlayerId(id), inventory))
            })
            .collect();
        Ok(Self { by_player })
    }

    pub fn from_file(path: &Path) -> Result<Self, FileInventoryError> {
        let contents = fs::read_to_string(path).map_err(|source| FileInventoryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn get(&self, player: PlayerId) -> Option<&EquippedInventory> {
        self.by_player.get(&player)
    }

    pub fn players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.by_player.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.by_player.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_player.is_empty()
    }
}
