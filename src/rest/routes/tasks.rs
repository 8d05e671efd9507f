// rest/routes/tasks.rs — task CRUD.
//
// Mutations go through the TaskStore, which republishes the snapshot; the
// reminder engine and SSE clients pick the change up from there. Handlers
// take full task ids — prefix resolution is a CLI convenience only.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::{bad_request, store_error, CoordinateBody};
use crate::tasks::{store::TaskFilter, Task};
use crate::AppContext;

pub async fn list_tasks(
    State(ctx): State<Arc<AppContext>>,
    Query(filter): Query<TaskFilter>,
) -> Result<Json<Vec<Task>>, (StatusCode, Json<Value>)> {
    ctx.store
        .list_tasks(filter)
        .await
        .map(Json)
        .map_err(store_error)
}

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub bound_location: Option<CoordinateBody>,
}

pub async fn create_task(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<CreateTaskRequest>,
) -> Result<Json<Task>, (StatusCode, Json<Value>)> {
    let title = body.title.trim();
    if title.is_empty() {
        return Err(bad_request("title must not be empty"));
    }
    let bound = match &body.bound_location {
        Some(raw) => Some(raw.validate().map_err(bad_request)?),
        None => None,
    };
    ctx.store
        .add_task(title, bound)
        .await
        .map(Json)
        .map_err(store_error)
}

pub async fn get_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, (StatusCode, Json<Value>)> {
    match ctx.store.get_task(&id).await.map_err(store_error)? {
        Some(task) => Ok(Json(task)),
        None => Err(store_error(crate::tasks::StoreError::NotFound(id))),
    }
}

#[derive(Deserialize)]
pub struct SetDoneRequest {
    pub done: bool,
}

pub async fn set_done(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    Json(body): Json<SetDoneRequest>,
) -> Result<Json<Task>, (StatusCode, Json<Value>)> {
    ctx.store
        .set_done(&id, body.done)
        .await
        .map(Json)
        .map_err(store_error)
}

pub async fn bind_location(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    Json(body): Json<CoordinateBody>,
) -> Result<Json<Task>, (StatusCode, Json<Value>)> {
    let coord = body.validate().map_err(bad_request)?;
    ctx.store
        .set_bound_location(&id, Some(coord))
        .await
        .map(Json)
        .map_err(store_error)
}

pub async fn unbind_location(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, (StatusCode, Json<Value>)> {
    ctx.store
        .set_bound_location(&id, None)
        .await
        .map(Json)
        .map_err(store_error)
}

pub async fn delete_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    ctx.store
        .remove_task(&id)
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(store_error)
}
