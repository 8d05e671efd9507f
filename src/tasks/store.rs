// tasks/store.rs — SQLite-backed task store, the source of task snapshots.
//
// Every successful mutation re-reads the full ordered task list and
// publishes it on a watch channel. Consumers (the reminder bridge, REST
// handlers) always see complete snapshots, never deltas.

use crate::geo::Coordinate;
use crate::tasks::Task;
use sqlx::SqlitePool;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

/// Upper bound on any single SQLite query. A wedged query must surface as
/// an error instead of stalling the daemon.
const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Run a store future under [`QUERY_TIMEOUT`].
async fn with_timeout<T>(
    fut: impl std::future::Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout),
    }
}

/// Typed store errors. REST handlers map these onto status codes;
/// everything else converts into `anyhow` at the call site.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("task {0} not found")]
    NotFound(String),
    #[error("id prefix {0:?} matches more than one task")]
    AmbiguousId(String),
    #[error("database query timed out after {}s", QUERY_TIMEOUT.as_secs())]
    Timeout,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

// ─── Row types ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
struct TaskRow {
    id: String,
    title: String,
    done: bool,
    bound_lat: Option<f64>,
    bound_lon: Option<f64>,
    created_at: i64,
    updated_at: i64,
}

impl TaskRow {
    fn into_task(self) -> Task {
        let bound_location = match (self.bound_lat, self.bound_lon) {
            (Some(lat), Some(lon)) => match Coordinate::new(lat, lon) {
                Ok(c) => Some(c),
                Err(e) => {
                    // Hand-edited rows can carry junk; treat as unbound.
                    warn!(task = %self.id, err = %e, "ignoring invalid bound location");
                    None
                }
            },
            _ => None,
        };
        Task {
            id: self.id,
            title: self.title,
            done: self.done,
            bound_location,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// ─── Query params ─────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, serde::Deserialize)]
pub struct TaskFilter {
    /// Keep only tasks with this done flag. None = all tasks.
    pub done: Option<bool>,
}

// ─── TaskStore ────────────────────────────────────────────────────────────────

fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[derive(Clone)]
pub struct TaskStore {
    pool: SqlitePool,
    snapshot_tx: watch::Sender<Vec<Task>>,
}

impl TaskStore {
    /// Wrap an open pool and publish the initial snapshot.
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        let (snapshot_tx, _) = watch::channel(Vec::new());
        let store = Self { pool, snapshot_tx };
        store.refresh().await?;
        Ok(store)
    }

    /// Subscribe to full task-list snapshots. The receiver starts with the
    /// current list and sees a new value after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Task>> {
        self.snapshot_tx.subscribe()
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Vec<Task> {
        self.snapshot_tx.borrow().clone()
    }

    /// Re-read the task list from SQLite and publish it. Called after every
    /// mutation and by the DB file watcher when another process writes.
    pub async fn refresh(&self) -> Result<usize, StoreError> {
        let tasks = self.load_all().await?;
        let count = tasks.len();
        self.snapshot_tx.send_replace(tasks);
        debug!(count, "published task snapshot");
        Ok(count)
    }

    async fn load_all(&self) -> Result<Vec<Task>, StoreError> {
        let pool = self.pool.clone();
        let rows: Vec<TaskRow> = with_timeout(async {
            Ok(
                // rowid tiebreak keeps insertion order for same-second adds.
                sqlx::query_as("SELECT * FROM tasks ORDER BY created_at, rowid")
                    .fetch_all(&pool)
                    .await?,
            )
        })
        .await?;
        Ok(rows.into_iter().map(TaskRow::into_task).collect())
    }

    // ─── Queries ──────────────────────────────────────────────────────────────

    pub async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, StoreError> {
        let mut tasks = self.load_all().await?;
        if let Some(done) = filter.done {
            tasks.retain(|t| t.done == done);
        }
        Ok(tasks)
    }

    pub async fn get_task(&self, id: &str) -> Result<Option<Task>, StoreError> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(TaskRow::into_task))
    }

    /// Resolve a (possibly shortened) task id. UUIDs are unwieldy on the
    /// command line, so any unique prefix is accepted.
    pub async fn resolve_id(&self, prefix: &str) -> Result<Task, StoreError> {
        let rows: Vec<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id LIKE ? || '%' LIMIT 2")
            .bind(prefix)
            .fetch_all(&self.pool)
            .await?;
        let mut rows = rows.into_iter();
        match (rows.next(), rows.next()) {
            (Some(row), None) => Ok(row.into_task()),
            (None, _) => Err(StoreError::NotFound(prefix.to_string())),
            (Some(_), Some(_)) => Err(StoreError::AmbiguousId(prefix.to_string())),
        }
    }

    // ─── Mutations ────────────────────────────────────────────────────────────

    pub async fn add_task(
        &self,
        title: &str,
        bound: Option<Coordinate>,
    ) -> Result<Task, StoreError> {
        let id = Uuid::new_v4().to_string();
        let now = now_ts();
        sqlx::query(
            "INSERT INTO tasks (id, title, done, bound_lat, bound_lon, created_at, updated_at)
             VALUES (?, ?, 0, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(title)
        .bind(bound.map(|c| c.latitude))
        .bind(bound.map(|c| c.longitude))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let task = self
            .get_task(&id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id))?;
        self.refresh().await?;
        Ok(task)
    }

    pub async fn rename_task(&self, id: &str, title: &str) -> Result<Task, StoreError> {
        let affected = sqlx::query("UPDATE tasks SET title = ?, updated_at = ? WHERE id = ?")
            .bind(title)
            .bind(now_ts())
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.fetch_after_update(id).await
    }

    pub async fn set_done(&self, id: &str, done: bool) -> Result<Task, StoreError> {
        let affected = sqlx::query("UPDATE tasks SET done = ?, updated_at = ? WHERE id = ?")
            .bind(done)
            .bind(now_ts())
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.fetch_after_update(id).await
    }

    /// Bind the task to a place, or clear the binding with `None`.
    pub async fn set_bound_location(
        &self,
        id: &str,
        bound: Option<Coordinate>,
    ) -> Result<Task, StoreError> {
        let affected = sqlx::query(
            "UPDATE tasks SET bound_lat = ?, bound_lon = ?, updated_at = ? WHERE id = ?",
        )
        .bind(bound.map(|c| c.latitude))
        .bind(bound.map(|c| c.longitude))
        .bind(now_ts())
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.fetch_after_update(id).await
    }

    pub async fn remove_task(&self, id: &str) -> Result<(), StoreError> {
        let affected = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.refresh().await?;
        Ok(())
    }

    async fn fetch_after_update(&self, id: &str) -> Result<Task, StoreError> {
        let task = self
            .get_task(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.refresh().await?;
        Ok(task)
    }
}
