// notify/mod.rs — outbound notification boundary.
//
// The reminder engine only ever sees `dyn Notifier`. Delivery is
// fire-and-forget: implementations must not block and must swallow their
// own failures (a missed toast is not a daemon error).

use crate::events::EventBroadcaster;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// One-way notification sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

// ─── TracingNotifier ──────────────────────────────────────────────────────────

/// Logs notifications at INFO. Always part of the serve-mode fanout so the
/// daemon log carries a record of every reminder.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, title: &str, body: &str) {
        info!(title = %title, body = %body, "reminder");
    }
}

// ─── BroadcastNotifier ────────────────────────────────────────────────────────

/// Publishes `reminder.fired` frames so SSE clients (frontends) can render
/// the notification themselves.
pub struct BroadcastNotifier {
    broadcaster: Arc<EventBroadcaster>,
}

impl BroadcastNotifier {
    pub fn new(broadcaster: Arc<EventBroadcaster>) -> Self {
        Self { broadcaster }
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, title: &str, body: &str) {
        self.broadcaster.broadcast(
            "reminder.fired",
            json!({
                "title": title,
                "body": body,
            }),
        );
    }
}

// ─── CommandNotifier ──────────────────────────────────────────────────────────

/// Spawns an external program with title and body as its two arguments —
/// the `notify-send` convention, which also fits `terminal-notifier` shims.
pub struct CommandNotifier {
    program: String,
}

impl CommandNotifier {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, title: &str, body: &str) {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.arg(title)
            .arg(body)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());
        let program = self.program.clone();
        // status() on a helper thread — the caller never waits, but the
        // child still gets reaped.
        std::thread::spawn(move || {
            if let Err(e) = cmd.status() {
                warn!(program = %program, err = %e, "notify command failed");
            }
        });
    }
}

// ─── FanoutNotifier ───────────────────────────────────────────────────────────

/// Delivers each notification to every sink in order.
pub struct FanoutNotifier {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(sinks: Vec<Arc<dyn Notifier>>) -> Self {
        Self { sinks }
    }
}

impl Notifier for FanoutNotifier {
    fn notify(&self, title: &str, body: &str) {
        for sink in &self.sinks {
            sink.notify(title, body);
        }
    }
}

// ─── RecordingNotifier ────────────────────────────────────────────────────────

/// Captures notifications in memory. For tests and embedders that poll
/// instead of pushing.
#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(title, body)` pairs seen so far, oldest first.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, body: &str) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((title.to_string(), body.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_captures_in_order() {
        let rec = RecordingNotifier::new();
        rec.notify("a", "1");
        rec.notify("b", "2");
        assert_eq!(
            rec.calls(),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn test_fanout_delivers_to_all_sinks() {
        let first = Arc::new(RecordingNotifier::new());
        let second = Arc::new(RecordingNotifier::new());
        let fanout = FanoutNotifier::new(vec![first.clone(), second.clone()]);
        fanout.notify("title", "body");
        assert_eq!(first.calls().len(), 1);
        assert_eq!(second.calls().len(), 1);
    }
}
