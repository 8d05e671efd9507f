pub mod store;
pub mod watcher;

pub use store::{StoreError, TaskStore};

use crate::geo::Coordinate;
use serde::{Deserialize, Serialize};

/// A to-do item. `bound_location` ties the task to a place; tasks without
/// a binding are never evaluated by the reminder engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub done: bool,
    pub bound_location: Option<Coordinate>,
    /// Unix epoch seconds.
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    /// True when the reminder engine should measure this task against a fix.
    pub fn is_geofenced(&self) -> bool {
        !self.done && self.bound_location.is_some()
    }
}
