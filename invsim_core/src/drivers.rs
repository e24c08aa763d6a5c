use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::engine::SyncEngine;

/// Periodic background drivers and the inventory file watcher. Dropping the
/// value stops them.
#[derive(Default)]
pub struct SyncDrivers {
    handles: Vec<JoinHandle<()>>,
    file_watcher: Option<RecommendedWatcher>,
}

impl SyncDrivers {
    /// Start the poll driver, the auto-reload driver when enabled, and a
    /// watcher on `inventory_file` when one is configured.
    /// Must be called from within a tokio runtime.
    pub fn start(engine: &Arc<SyncEngine>) -> Self {
        let config = engine.config();
        let mut handles = vec![spawn_periodic(engine, config.poll_interval(), |engine| {
            engine.poll_tick();
        })];
        if config.autoreload_enabled {
            handles.push(spawn_periodic(
                engine,
                config.autoreload_interval(),
                |engine| {
                    engine.auto_reload_tick();
                },
            ));
        }

        let file_watcher = config.inventory_file.as_deref().and_then(|path| {
            match watch_inventory_file(engine, path) {
                Ok(watcher) => Some(watcher),
                Err(err) => {
                    warn!(
                        target: "invsim::drivers",
                        path = %path.display(),
                        error = %err,
                        "inventory_file.watch_failed"
                    );
                    None
                }
            }
        });

        info!(
            target: "invsim::drivers",
            poll_interval_ms = config.poll_interval().as_millis() as u64,
            autoreload = config.autoreload_enabled,
            watching_file = file_watcher.is_some(),
            "drivers.started"
        );
        Self {
            handles,
            file_watcher,
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn watches_inventory_file(&self) -> bool {
        self.file_watcher.is_some()
    }

    pub fn stop(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        self.file_watcher = None;
    }
}

impl fmt::Debug for SyncDrivers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncDrivers")
            .field("handles", &self.handles.len())
            .field("watching_file", &self.file_watcher.is_some())
            .finish()
    }
}

impl Drop for SyncDrivers {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_periodic(
    engine: &Arc<SyncEngine>,
    period: Duration,
    tick: fn(&Arc<SyncEngine>),
) -> JoinHandle<()> {
    let engine = Arc::clone(engine);
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so the first pass runs
        // one full period after start.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            tick(&engine);
        }
    })
}

/// Watch the directory holding `path` so editors that replace the file are
/// still seen, and reload on writes or creations of that file name.
fn watch_inventory_file(engine: &Arc<SyncEngine>, path: &Path) -> notify::Result<RecommendedWatcher> {
    let engine = Arc::clone(engine);
    let target = path.to_path_buf();
    let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| match result {
        Ok(event) if touches_file(&event, &target) => {
            // Failures are logged by the engine and keep the old contents.
            let _ = engine.reload_inventory_file(&target);
        }
        Ok(_) => {}
        Err(err) => {
            warn!(target: "invsim::drivers", error = %err, "inventory_file.watch_error");
        }
    })?;

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    watcher.watch(&directory, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

fn touches_file(event: &Event, target: &Path) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|changed| changed.file_name() == target.file_name())
}
