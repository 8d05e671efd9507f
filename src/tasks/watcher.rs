// tasks/watcher.rs — DB file watcher for out-of-process edits.
//
// The CLI writes straight to SQLite without going through the daemon.
// Watching the database file lets a running daemon pick those edits up
// and republish the task snapshot, so the reminder engine stays current.

use crate::tasks::TaskStore;
use notify_debouncer_full::{
    new_debouncer,
    notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher},
    DebounceEventResult, Debouncer, FileIdMap,
};
use std::{path::Path, time::Duration};
use tracing::{debug, info, warn};

/// Watches the SQLite database file (and its WAL sidecars) and refreshes
/// the task snapshot when another process writes to it.
pub struct StoreWatcher {
    // The debouncer thread stops when this is dropped.
    _watcher: Debouncer<RecommendedWatcher, FileIdMap>,
}

impl StoreWatcher {
    /// Start watching `{data_dir}/tether.db*` for changes.
    ///
    /// `None` when the watcher cannot be set up. That is not fatal: REST
    /// mutations still publish snapshots, only external edits go unseen.
    pub fn start(data_dir: &Path, store: TaskStore) -> Option<Self> {
        let rt_handle = tokio::runtime::Handle::current();

        let watcher = new_debouncer(
            Duration::from_secs(2),
            None,
            move |result: DebounceEventResult| {
                if let Ok(events) = result {
                    // Only act on modify/create events touching the DB file.
                    let relevant = events.iter().any(|e| {
                        matches!(e.event.kind, EventKind::Modify(_) | EventKind::Create(_))
                            && e.event.paths.iter().any(|p| {
                                p.file_name()
                                    .and_then(|n| n.to_str())
                                    .is_some_and(|n| n.starts_with("tether.db"))
                            })
                    });
                    if relevant {
                        let store = store.clone();
                        rt_handle.spawn(async move {
                            match store.refresh().await {
                                Ok(count) => {
                                    debug!(count, "task snapshot refreshed after external write")
                                }
                                Err(e) => warn!(err = %e, "snapshot refresh failed"),
                            }
                        });
                    }
                }
            },
        );

        match watcher {
            Ok(mut debouncer) => {
                if let Err(e) = debouncer
                    .watcher()
                    .watch(data_dir, RecursiveMode::NonRecursive)
                {
                    warn!("DB watcher failed to start: {e} — external edits need a restart");
                    return None;
                }
                info!(dir = %data_dir.display(), "DB file watcher started");
                Some(Self {
                    _watcher: debouncer,
                })
            }
            Err(e) => {
                warn!("DB watcher creation failed: {e} — external edits need a restart");
                None
            }
        }
    }
}
