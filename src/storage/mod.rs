use anyhow::{Context as _, Result};
use sqlx::{sqlite::SqliteConnectOptions, ConnectOptions, SqlitePool};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        Self::new_with_slow_query(data_dir, 0).await
    }

    /// Open (or create) `{data_dir}/tether.db` and run pending migrations.
    ///
    /// Queries slower than `slow_query_ms` are logged at WARN; 0 disables
    /// that. WAL journaling plus a 5 s busy timeout lets the CLI and a
    /// running daemon write the same file without tripping over each other.
    pub async fn new_with_slow_query(data_dir: &Path, slow_query_ms: u64) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .with_context(|| format!("creating data dir {}", data_dir.display()))?;

        let mut opts = SqliteConnectOptions::new()
            .filename(data_dir.join("tether.db"))
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        if slow_query_ms > 0 {
            opts = opts
                .log_slow_statements(log::LevelFilter::Warn, Duration::from_millis(slow_query_ms));
        }

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Clone out the pool handle (Arc inside, so this is cheap).
    /// Used to create the TaskStore sharing the same SQLite connection.
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::migrate!("src/storage/migrations")
            .run(pool)
            .await
            .context("running database migrations")?;
        Ok(())
    }

    /// Fold the write-ahead log into `tether.db` (`TRUNCATE` checkpoint).
    /// Run on clean shutdown so CLI invocations read one fresh file.
    pub async fn checkpoint_wal(&self) -> Result<()> {
        let row: (i64, i64, i64) = sqlx::query_as("PRAGMA wal_checkpoint(TRUNCATE)")
            .fetch_one(&self.pool)
            .await?;
        debug!(
            busy = row.0 != 0,
            log_frames = row.1,
            checkpointed = row.2,
            "WAL checkpoint complete"
        );
        Ok(())
    }
}
