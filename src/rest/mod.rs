// rest/mod.rs — local REST API server.
//
// Axum HTTP server on {bind_address}:{port}, loopback by default. This is
// the daemon's whole wire surface: task CRUD, location ingest, and an SSE
// event stream.
//
// Endpoints:
//   GET    /api/v1/health
//   GET    /api/v1/tasks            POST /api/v1/tasks
//   GET    /api/v1/tasks/{id}       DELETE /api/v1/tasks/{id}
//   POST   /api/v1/tasks/{id}/done
//   PUT    /api/v1/tasks/{id}/location   DELETE /api/v1/tasks/{id}/location
//   GET    /api/v1/location
//   PUT    /api/v1/location         DELETE /api/v1/location
//   GET    /api/v1/events           (SSE)

pub mod routes;
pub mod sse;

use anyhow::Result;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("REST API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Resolves on SIGTERM or Ctrl-C (Ctrl-C only off Unix). Drives axum's
/// graceful shutdown so in-flight requests finish before the pool closes.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
    info!("shutdown signal received — draining connections and stopping");
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::health::health))
        .route(
            "/api/v1/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/api/v1/tasks/{id}",
            get(routes::tasks::get_task).delete(routes::tasks::delete_task),
        )
        .route("/api/v1/tasks/{id}/done", post(routes::tasks::set_done))
        .route(
            "/api/v1/tasks/{id}/location",
            put(routes::tasks::bind_location).delete(routes::tasks::unbind_location),
        )
        .route(
            "/api/v1/location",
            get(routes::location::get_location)
                .put(routes::location::put_location)
                .delete(routes::location::clear_location),
        )
        .route("/api/v1/events", get(sse::events_sse))
        // Browser frontends on other local ports need CORS.
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
