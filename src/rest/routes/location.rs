// rest/routes/location.rs — location ingest.
//
// PUT feeds the location source; DELETE marks the location unknown. The
// bridge forwards either to the reminder engine.

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use super::{bad_request, CoordinateBody};
use crate::AppContext;

pub async fn get_location(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    match *ctx.location_tx.borrow() {
        Some(c) => Json(json!({ "latitude": c.latitude, "longitude": c.longitude })),
        None => Json(json!({ "latitude": null, "longitude": null })),
    }
}

pub async fn put_location(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<CoordinateBody>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    let coord = body.validate().map_err(bad_request)?;
    ctx.location_tx.send_replace(Some(coord));
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_location(State(ctx): State<Arc<AppContext>>) -> StatusCode {
    ctx.location_tx.send_replace(None);
    StatusCode::NO_CONTENT
}
