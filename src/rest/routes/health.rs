use crate::AppContext;
use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

pub async fn health(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    let uptime = ctx.started_at.elapsed().as_secs();
    let tasks = ctx.store.snapshot();
    let open = tasks.iter().filter(|t| !t.done).count();
    let geofenced = tasks.iter().filter(|t| t.is_geofenced()).count();
    Json(json!({
        "status": "ok",
        "uptime_secs": uptime,
        "version": env!("CARGO_PKG_VERSION"),
        "tasks_total": tasks.len(),
        "tasks_open": open,
        "tasks_geofenced": geofenced,
        "away_task_ids": ctx.engine.away_task_ids(),
        "threshold_meters": ctx.engine.threshold_meters(),
        "has_fix": ctx.location_tx.borrow().is_some(),
    }))
}
