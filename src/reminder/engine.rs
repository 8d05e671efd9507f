// SPDX-License-Identifier: MIT
//! engine.rs — the geofence reminder engine.
//!
//! Consumes two inputs: location fixes and full task-list snapshots. After
//! every input it recomputes the set of "away" tasks (open, bound to a
//! place, farther from the latest fix than the departure threshold) and
//! fires one notification per task that just entered the set. Tasks that
//! stay away or come back are silent: the away set is level state, the
//! notification is its rising edge.

use crate::geo::{haversine_meters, Coordinate};
use crate::notify::Notifier;
use crate::tasks::Task;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Departure distance in meters. A task is away only when strictly farther
/// than this from the last fix.
pub const DEFAULT_DEPARTURE_THRESHOLD_METERS: f64 = 100.0;

/// Fixed title for every departure notification.
pub const REMINDER_TITLE: &str = "Tether reminder";

type DistanceFn = fn(Coordinate, Coordinate) -> f64;

#[derive(Default)]
struct EngineState {
    /// Most recent fix; `None` while the location is unknown.
    last_fix: Option<Coordinate>,
    /// Latest task snapshot, replaced wholesale on every `on_tasks_changed`.
    tasks: Vec<Task>,
    /// Ids of tasks currently judged away.
    away: HashSet<String>,
}

pub struct ReminderEngine {
    notifier: Arc<dyn Notifier>,
    threshold_meters: f64,
    distance: DistanceFn,
    state: Mutex<EngineState>,
}

impl ReminderEngine {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self::with_threshold(notifier, DEFAULT_DEPARTURE_THRESHOLD_METERS)
    }

    pub fn with_threshold(notifier: Arc<dyn Notifier>, threshold_meters: f64) -> Self {
        Self {
            notifier,
            threshold_meters,
            distance: haversine_meters,
            state: Mutex::new(EngineState::default()),
        }
    }

    /// Swap the geodesic formula. Tests use this to pin threshold boundaries
    /// with exact values.
    pub fn with_distance_fn(mut self, distance: DistanceFn) -> Self {
        self.distance = distance;
        self
    }

    pub fn threshold_meters(&self) -> f64 {
        self.threshold_meters
    }

    /// Record a new fix (or the loss of one) and recompute.
    ///
    /// `None` is a valid state, not an error: with no fix, no task is judged
    /// away. Never blocks beyond the recompute critical section.
    pub fn on_location_changed(&self, fix: Option<Coordinate>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.last_fix = fix;
        self.recompute(&mut state);
    }

    /// Replace the task snapshot and recompute.
    pub fn on_tasks_changed(&self, tasks: Vec<Task>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.tasks = tasks;
        self.recompute(&mut state);
    }

    /// Ids currently judged away, sorted for stable output.
    pub fn away_task_ids(&self) -> Vec<String> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = state.away.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Rebuild the away set from scratch, emit a notification for every task
    /// that just entered it, then store the new set. Runs under the state
    /// lock, so concurrent callers observe each transition exactly once.
    fn recompute(&self, state: &mut EngineState) {
        let new_away: HashSet<String> = match state.last_fix {
            // Unknown location: nothing is away (and nothing is "here" either).
            None => HashSet::new(),
            Some(fix) => state
                .tasks
                .iter()
                .filter(|t| !t.done)
                .filter_map(|t| t.bound_location.map(|bound| (t, bound)))
                .filter(|(_, bound)| (self.distance)(fix, *bound) > self.threshold_meters)
                .map(|(t, _)| t.id.clone())
                .collect(),
        };

        let transitioned: Vec<String> = new_away.difference(&state.away).cloned().collect();
        for id in &transitioned {
            if let Some(task) = state.tasks.iter().find(|t| &t.id == id) {
                info!(task = %task.id, title = %task.title, "departure detected");
                self.notifier.notify(
                    REMINDER_TITLE,
                    &format!("\"{}\" is still open and you're leaving its area.", task.title),
                );
            }
        }

        debug!(
            away = new_away.len(),
            departed = transitioned.len(),
            tasks = state.tasks.len(),
            has_fix = state.last_fix.is_some(),
            "away set recomputed"
        );
        state.away = new_away;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;

    // One millidegree of latitude is ~111.19 m; half of it ~55.6 m.
    const HOME: Coordinate = Coordinate {
        latitude: 37.0,
        longitude: -122.0,
    };
    const NEARBY: Coordinate = Coordinate {
        latitude: 37.0005,
        longitude: -122.0,
    };
    const FAR: Coordinate = Coordinate {
        latitude: 37.001,
        longitude: -122.0,
    };
    const FARTHER: Coordinate = Coordinate {
        latitude: 37.002,
        longitude: -122.0,
    };

    fn make_task(id: &str, bound: Option<Coordinate>) -> Task {
        Task {
            id: id.to_string(),
            title: format!("Task {id}"),
            done: false,
            bound_location: bound,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn make_engine() -> (ReminderEngine, Arc<RecordingNotifier>) {
        let rec = Arc::new(RecordingNotifier::new());
        let engine = ReminderEngine::new(rec.clone());
        (engine, rec)
    }

    #[test]
    fn test_departure_fires_exactly_once() {
        let (engine, rec) = make_engine();
        engine.on_tasks_changed(vec![make_task("t1", Some(HOME))]);
        engine.on_location_changed(Some(HOME));
        assert!(rec.calls().is_empty(), "at the bound location, no reminder");

        engine.on_location_changed(Some(FAR));
        assert_eq!(rec.calls().len(), 1, "crossing the threshold notifies once");

        engine.on_location_changed(Some(FARTHER));
        assert_eq!(rec.calls().len(), 1, "staying away must not re-notify");
    }

    #[test]
    fn test_return_is_silent_and_redeparture_notifies_again() {
        let (engine, rec) = make_engine();
        engine.on_tasks_changed(vec![make_task("t1", Some(HOME))]);
        engine.on_location_changed(Some(FAR));
        assert_eq!(rec.calls().len(), 1);

        engine.on_location_changed(Some(HOME));
        assert_eq!(rec.calls().len(), 1, "coming back must not notify");
        assert!(engine.away_task_ids().is_empty());

        engine.on_location_changed(Some(FAR));
        assert_eq!(rec.calls().len(), 2, "a new departure is a new episode");
    }

    #[test]
    fn test_done_tasks_are_never_away() {
        let (engine, rec) = make_engine();
        let mut task = make_task("t1", Some(HOME));
        task.done = true;
        engine.on_tasks_changed(vec![task]);
        engine.on_location_changed(Some(FARTHER));
        assert!(rec.calls().is_empty());
        assert!(engine.away_task_ids().is_empty());
    }

    #[test]
    fn test_unbound_tasks_are_never_away() {
        let (engine, rec) = make_engine();
        engine.on_tasks_changed(vec![make_task("t1", None)]);
        engine.on_location_changed(Some(FARTHER));
        assert!(rec.calls().is_empty());
    }

    #[test]
    fn test_unknown_location_empties_the_away_set() {
        let (engine, rec) = make_engine();
        engine.on_tasks_changed(vec![make_task("t1", Some(HOME))]);
        engine.on_location_changed(Some(FAR));
        assert_eq!(engine.away_task_ids(), vec!["t1".to_string()]);

        engine.on_location_changed(None);
        assert!(engine.away_task_ids().is_empty(), "no fix, nothing is away");
        assert_eq!(rec.calls().len(), 1, "losing the fix must not notify");

        // The next far fix starts a fresh episode.
        engine.on_location_changed(Some(FAR));
        assert_eq!(rec.calls().len(), 2);
    }

    #[test]
    fn test_snapshot_change_can_trigger_departure() {
        let (engine, rec) = make_engine();
        engine.on_location_changed(Some(FAR));
        assert!(rec.calls().is_empty(), "no tasks yet");

        // The user was already far away when the task arrived.
        engine.on_tasks_changed(vec![make_task("t1", Some(HOME))]);
        assert_eq!(rec.calls().len(), 1);
    }

    #[test]
    fn test_completing_then_reopening_far_task_renotifies() {
        let (engine, rec) = make_engine();
        let open = make_task("t1", Some(HOME));
        let mut done = open.clone();
        done.done = true;

        engine.on_tasks_changed(vec![open.clone()]);
        engine.on_location_changed(Some(FAR));
        assert_eq!(rec.calls().len(), 1);

        engine.on_tasks_changed(vec![done]);
        assert!(engine.away_task_ids().is_empty(), "done leaves the away set");
        assert_eq!(rec.calls().len(), 1);

        engine.on_tasks_changed(vec![open]);
        assert_eq!(rec.calls().len(), 2, "reopening far away is a departure");
    }

    #[test]
    fn test_empty_snapshot_clears_away_set() {
        let (engine, rec) = make_engine();
        engine.on_tasks_changed(vec![make_task("t1", Some(HOME))]);
        engine.on_location_changed(Some(FAR));
        assert_eq!(rec.calls().len(), 1);

        engine.on_tasks_changed(Vec::new());
        assert!(engine.away_task_ids().is_empty());

        engine.on_tasks_changed(vec![make_task("t1", Some(HOME))]);
        assert_eq!(rec.calls().len(), 2, "the task re-enters the away set");
    }

    #[test]
    fn test_mixed_snapshot_only_far_open_bound_tasks_notify() {
        let (engine, rec) = make_engine();
        let mut done_far = make_task("done-far", Some(HOME));
        done_far.done = true;
        engine.on_tasks_changed(vec![
            make_task("near", Some(NEARBY)),
            make_task("far", Some(HOME)),
            done_far,
            make_task("unbound", None),
        ]);
        engine.on_location_changed(Some(FAR));

        assert_eq!(engine.away_task_ids(), vec!["far".to_string()]);
        let calls = rec.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, REMINDER_TITLE);
        assert!(
            calls[0].1.contains("Task far"),
            "body must name the task: {}",
            calls[0].1
        );
    }

    // ── Threshold boundary ────────────────────────────────────────────────────

    fn distance_exactly_100(_: Coordinate, _: Coordinate) -> f64 {
        100.0
    }

    fn distance_just_over_100(_: Coordinate, _: Coordinate) -> f64 {
        100.01
    }

    #[test]
    fn test_exactly_at_threshold_is_not_away() {
        let rec = Arc::new(RecordingNotifier::new());
        let engine = ReminderEngine::new(rec.clone()).with_distance_fn(distance_exactly_100);
        engine.on_tasks_changed(vec![make_task("t1", Some(HOME))]);
        engine.on_location_changed(Some(FAR));
        assert!(rec.calls().is_empty(), "100.0 m is not strictly > 100.0 m");
    }

    #[test]
    fn test_just_over_threshold_is_away() {
        let rec = Arc::new(RecordingNotifier::new());
        let engine = ReminderEngine::new(rec.clone()).with_distance_fn(distance_just_over_100);
        engine.on_tasks_changed(vec![make_task("t1", Some(HOME))]);
        engine.on_location_changed(Some(FAR));
        assert_eq!(rec.calls().len(), 1);
    }

    #[test]
    fn test_threshold_boundary_with_real_distances() {
        // Pin the boundary without a stub: set the threshold to the exact
        // haversine distance of the pair, then nudge it below.
        let d = haversine_meters(FAR, HOME);

        let rec = Arc::new(RecordingNotifier::new());
        let engine = ReminderEngine::with_threshold(rec.clone(), d);
        engine.on_tasks_changed(vec![make_task("t1", Some(HOME))]);
        engine.on_location_changed(Some(FAR));
        assert!(rec.calls().is_empty(), "equal distance is not a departure");

        let rec = Arc::new(RecordingNotifier::new());
        let engine = ReminderEngine::with_threshold(rec.clone(), d - 0.001);
        engine.on_tasks_changed(vec![make_task("t1", Some(HOME))]);
        engine.on_location_changed(Some(FAR));
        assert_eq!(rec.calls().len(), 1);
    }

    #[test]
    fn test_custom_threshold() {
        // NEARBY is ~55.6 m out: away at a 50 m threshold, not at 100 m.
        let rec = Arc::new(RecordingNotifier::new());
        let engine = ReminderEngine::with_threshold(rec.clone(), 50.0);
        engine.on_tasks_changed(vec![make_task("t1", Some(HOME))]);
        engine.on_location_changed(Some(NEARBY));
        assert_eq!(rec.calls().len(), 1);

        let (engine, rec) = make_engine();
        engine.on_tasks_changed(vec![make_task("t1", Some(HOME))]);
        engine.on_location_changed(Some(NEARBY));
        assert!(rec.calls().is_empty());
    }
}
