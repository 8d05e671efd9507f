// reminder/bridge.rs — single consumer of both source streams.
//
// All serve-mode input reaches the engine through this one loop, so engine
// calls are serialized end to end. Watch channels coalesce: the engine only
// ever sees the latest snapshot and the latest fix, which is exactly the
// level-state semantics it wants.

use crate::events::EventBroadcaster;
use crate::geo::Coordinate;
use crate::reminder::ReminderEngine;
use crate::tasks::Task;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Forward task snapshots and location fixes into the engine until either
/// sender is gone. Also broadcasts change events for SSE clients.
pub async fn run_source_bridge(
    engine: Arc<ReminderEngine>,
    mut task_rx: watch::Receiver<Vec<Task>>,
    mut location_rx: watch::Receiver<Option<Coordinate>>,
    broadcaster: Arc<EventBroadcaster>,
) {
    // Seed with the current snapshot before listening for edges; the fix
    // starts unknown, so this cannot fire a reminder at boot.
    engine.on_tasks_changed(task_rx.borrow_and_update().clone());

    loop {
        tokio::select! {
            changed = task_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let tasks = task_rx.borrow_and_update().clone();
                broadcaster.broadcast("tasks.changed", json!({ "count": tasks.len() }));
                engine.on_tasks_changed(tasks);
            }
            changed = location_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let fix = *location_rx.borrow_and_update();
                match fix {
                    Some(c) => broadcaster.broadcast(
                        "location.changed",
                        json!({ "latitude": c.latitude, "longitude": c.longitude }),
                    ),
                    None => broadcaster.broadcast("location.cleared", json!({})),
                }
                engine.on_location_changed(fix);
            }
        }
    }
    debug!("source bridge stopped");
}
