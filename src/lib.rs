pub mod cli;
pub mod config;
pub mod doctor;
pub mod events;
pub mod geo;
pub mod notify;
pub mod reminder;
pub mod rest;
pub mod storage;
pub mod tasks;

use std::sync::Arc;

use tokio::sync::watch;

use config::TetherdConfig;
use events::EventBroadcaster;
use geo::Coordinate;
use reminder::ReminderEngine;
use tasks::TaskStore;

/// Shared application state passed to every REST handler and background task.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<TetherdConfig>,
    pub store: TaskStore,
    pub broadcaster: Arc<EventBroadcaster>,
    pub engine: Arc<ReminderEngine>,
    /// Device position feed. `PUT /api/v1/location` replaces the value,
    /// `DELETE` sets it back to None (fix lost).
    pub location_tx: watch::Sender<Option<Coordinate>>,
    pub started_at: std::time::Instant,
}
