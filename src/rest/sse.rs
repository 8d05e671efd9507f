// rest/sse.rs — SSE push event bridge.
//
// GET /api/v1/events
//
// Streams daemon events (tasks.changed, location.changed, location.cleared,
// reminder.fired) as Server-Sent Events. Each SSE event is named after the
// frame's `event` field and carries the whole frame as data.

use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures_util::stream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

use crate::AppContext;

pub async fn events_sse(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    let rx = ctx.broadcaster.subscribe();

    let s = stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(frame) => {
                    // Frames arrive as serialized {event, params} objects.
                    let event: serde_json::Value = match serde_json::from_str(&frame) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };
                    let name = event
                        .get("event")
                        .and_then(|v| v.as_str())
                        .unwrap_or("event")
                        .to_string();
                    let sse_event = Event::default().data(frame).event(name);
                    return Some((Ok::<Event, std::convert::Infallible>(sse_event), rx));
                }
                // Slow consumer: skip what was missed, keep streaming.
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(s).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
