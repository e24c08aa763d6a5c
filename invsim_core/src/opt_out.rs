use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

use crate::state::PlayerId;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed opt-out list in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Players who asked not to receive round-win rewards.
///
/// Stored as a JSON array of decimal id strings. The file is rewritten in
/// full on every toggle; when that fails the in-memory set stays
/// authoritative for the rest of the session.
#[derive(Debug)]
pub struct NoCasesOptOut {
    path: Option<PathBuf>,
    ids: Mutex<BTreeSet<u64>>,
}

impl NoCasesOptOut {
    /// Set with no backing file.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            ids: Mutex::new(BTreeSet::new()),
        }
    }

    /// Load the set from `path`. A missing file is an empty set; unreadable
    /// or malformed files are logged and also yield an empty set.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let ids = match read_ids(&path) {
            Ok(ids) => ids,
            Err(err) => {
                tracing::error!(
                    target: "invsim::opt_out",
                    error = %err,
                    "nocases.load_failed"
                );
                BTreeSet::new()
            }
        };
        tracing::debug!(
            target: "invsim::opt_out",
            path = %path.display(),
            count = ids.len(),
            "nocases.loaded"
        );
        Self {
            path: Some(path),
            ids: Mutex::new(ids),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_opted_out(&self, player: PlayerId) -> bool {
        self.ids
            .lock()
            .expect("opt-out set mutex poisoned")
            .contains(&player.0)
    }

    /// Flip the player's opt-out and persist. Returns `true` when the
    /// player is opted out afterwards.
    pub fn toggle(&self, player: PlayerId) -> bool {
        let mut ids = self.ids.lock().expect("opt-out set mutex poisoned");
        let opted_out = if ids.remove(&player.0) {
            false
        } else {
            ids.insert(player.0);
            true
        };
        // Written under the lock so concurrent toggles cannot reorder writes.
        if let Err(err) = self.write_ids(&ids) {
            tracing::error!(
                target: "invsim::opt_out",
                %player,
                error = %err,
                "nocases.save_failed"
            );
        }
        opted_out
    }

    pub fn len(&self) -> usize {
        self.ids.lock().expect("opt-out set mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write_ids(&self, ids: &BTreeSet<u64>) -> Result<(), PersistenceError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| PersistenceError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let list: Vec<String> = ids.iter().map(u64::to_string).collect();
        let json = serde_json::to_string(&list).map_err(|source| PersistenceError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| PersistenceError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn read_ids(path: &Path) -> Result<BTreeSet<u64>, PersistenceError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(source) => {
            return Err(PersistenceError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let entries: Vec<String> =
        serde_json::from_str(&contents).map_err(|source| PersistenceError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(entries
        .iter()
        .filter_map(|entry| entry.trim().parse::<u64>().ok())
        .collect())
}
