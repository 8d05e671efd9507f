use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

use tetherd::cli::client::DaemonClient;
use tetherd::config::TetherdConfig;
use tetherd::doctor;
use tetherd::events::EventBroadcaster;
use tetherd::geo::Coordinate;
use tetherd::notify::{
    BroadcastNotifier, CommandNotifier, FanoutNotifier, Notifier, TracingNotifier,
};
use tetherd::reminder::{run_source_bridge, ReminderEngine};
use tetherd::rest::start_rest_server;
use tetherd::storage::Storage;
use tetherd::tasks::store::TaskFilter;
use tetherd::tasks::watcher::StoreWatcher;
use tetherd::tasks::{Task, TaskStore};
use tetherd::AppContext;

#[derive(Parser)]
#[command(
    name = "tetherd",
    about = "Tether — location-aware to-do daemon",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// REST API port
    #[arg(long, env = "TETHERD_PORT")]
    port: Option<u16>,

    /// Data directory for config and the SQLite database
    #[arg(long, env = "TETHERD_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TETHERD_LOG")]
    log: Option<String>,

    /// Bind address for the REST server (default: 127.0.0.1; use 0.0.0.0 for LAN access)
    #[arg(long, env = "TETHERD_BIND")]
    bind_address: Option<String>,

    /// Also write logs to this file (daily rotation)
    #[arg(long, env = "TETHERD_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,

    /// Only print errors and requested output.
    ///
    /// Informational chatter is dropped; errors still go to stderr and
    /// --json output is unchanged, so this is safe in pipelines.
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon in the foreground (the default subcommand).
    ///
    /// Brings up the REST API, the SSE event stream, and the geofence
    /// reminder engine, and runs until SIGTERM or Ctrl-C.
    ///
    /// Examples:
    ///   tetherd serve
    ///   tetherd
    Serve,
    /// Manage tasks.
    ///
    /// Works directly against the SQLite database, so it does not need the
    /// daemon to be running. A running daemon picks the change up through
    /// its DB file watcher.
    ///
    /// Task IDs may be abbreviated to any unique prefix.
    ///
    /// Examples:
    ///   tetherd task add "buy milk" --at 59.33,18.07
    ///   tetherd task list --open
    ///   tetherd task done 3f2a
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Report or clear the device location on a running daemon.
    ///
    /// Feeds the reminder engine. Requires the daemon to be running;
    /// leaving the area of an open bound task after a `location set`
    /// fires a reminder.
    ///
    /// Examples:
    ///   tetherd location set 59.33,18.07
    ///   tetherd location clear
    Location {
        #[command(subcommand)]
        action: LocationAction,
    },
    /// Show daemon status (running, version, tasks, away set).
    ///
    /// Asks the running daemon for its health summary and prints one
    /// line. Exits 0 when healthy, 1 when the daemon is unreachable.
    ///
    /// Examples:
    ///   tetherd status
    ///   tetherd status --json
    Status {
        /// Machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
    /// Run diagnostic checks on daemon prerequisites.
    ///
    /// Checks port availability, data directory writability, SQLite
    /// database accessibility, and the configured notify command.
    /// Exits non-zero when any check fails.
    ///
    /// Examples:
    ///   tetherd doctor
    Doctor,
}

#[derive(Subcommand)]
enum TaskAction {
    /// Add a task, optionally bound to a location.
    ///
    /// Examples:
    ///   tetherd task add "buy milk"
    ///   tetherd task add "water plants" --at 59.3293,18.0686
    Add {
        /// Task title
        title: String,
        /// Bind the task to a location (latitude,longitude)
        #[arg(long, value_name = "LAT,LON")]
        at: Option<Coordinate>,
    },
    /// List tasks.
    ///
    /// Examples:
    ///   tetherd task list
    ///   tetherd task list --open
    ///   tetherd task list --json
    List {
        /// Only open tasks
        #[arg(long, conflicts_with = "done")]
        open: bool,
        /// Only completed tasks
        #[arg(long)]
        done: bool,
        /// Print the raw JSON array instead of the table
        #[arg(long)]
        json: bool,
    },
    /// Show the full detail of one task.
    ///
    /// Examples:
    ///   tetherd task show 3f2a
    Show {
        /// Task ID (any unique prefix)
        id: String,
    },
    /// Mark a task as done.
    ///
    /// Examples:
    ///   tetherd task done 3f2a
    Done {
        /// Task ID (any unique prefix)
        id: String,
    },
    /// Reopen a completed task.
    ///
    /// Examples:
    ///   tetherd task reopen 3f2a
    Reopen {
        /// Task ID (any unique prefix)
        id: String,
    },
    /// Rename a task.
    ///
    /// Examples:
    ///   tetherd task rename 3f2a "buy oat milk"
    Rename {
        /// Task ID (any unique prefix)
        id: String,
        /// New title
        title: String,
    },
    /// Bind a task to a location.
    ///
    /// Examples:
    ///   tetherd task bind 3f2a 59.3293,18.0686
    Bind {
        /// Task ID (any unique prefix)
        id: String,
        /// Location (latitude,longitude)
        at: Coordinate,
    },
    /// Remove the location binding from a task.
    ///
    /// Examples:
    ///   tetherd task unbind 3f2a
    Unbind {
        /// Task ID (any unique prefix)
        id: String,
    },
    /// Delete a task.
    ///
    /// Examples:
    ///   tetherd task rm 3f2a
    Rm {
        /// Task ID (any unique prefix)
        id: String,
    },
}

#[derive(Subcommand)]
enum LocationAction {
    /// Report the current device position.
    ///
    /// Examples:
    ///   tetherd location set 59.3293,18.0686
    Set {
        /// Position (latitude,longitude)
        at: Coordinate,
    },
    /// Mark the device position as unknown.
    ///
    /// Clears the away set — no reminders fire until the next fix.
    ///
    /// Examples:
    ///   tetherd location clear
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ── Logging setup ────────────────────────────────────────────────────────
    // The subscriber can only be installed once, before any tracing call.
    let log_level = args.log.as_deref().unwrap_or("info").to_owned();
    let log_format =
        std::env::var("TETHERD_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let _file_guard = setup_logging(&log_level, args.log_file.as_deref(), &log_format);

    let quiet = args.quiet;
    match args.command {
        Some(Command::Task { action }) => {
            let config =
                TetherdConfig::new(args.port, args.data_dir, Some("error".to_string()), None);
            run_task(&config, action, quiet).await?;
        }
        Some(Command::Location { action }) => {
            let config =
                TetherdConfig::new(args.port, args.data_dir, Some("error".to_string()), None);
            run_location(&config, action, quiet).await?;
        }
        Some(Command::Status { json }) => {
            let config =
                TetherdConfig::new(args.port, args.data_dir, Some("error".to_string()), None);
            let exit_code = run_status(&config, json).await;
            std::process::exit(exit_code);
        }
        Some(Command::Doctor) => {
            let config = TetherdConfig::new(
                args.port,
                args.data_dir,
                Some("error".to_string()),
                args.bind_address,
            );
            let results = doctor::run_doctor(&config);
            doctor::print_doctor_results(&results);
            let failed = results.iter().filter(|r| !r.passed).count();
            std::process::exit(if failed == 0 { 0 } else { 1 });
        }
        None | Some(Command::Serve) => {
            run_serve(args.port, args.data_dir, args.log, args.bind_address).await?;
        }
    }

    Ok(())
}

/// Install the global tracing subscriber.
///
/// With `log_file` set, output goes to stdout and a daily-rolling file;
/// the returned `WorkerGuard` must live as long as the process or buffered
/// lines are lost. `log_format` is `"pretty"` (compact, for humans) or
/// `"json"` (one object per line, for log aggregators). A log directory
/// that cannot be created degrades to stdout-only with a warning rather
/// than aborting startup.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("tetherd.log"));

        // tracing-appender opens the file lazily; the directory must exist first.
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "warn: log directory '{}' could not be created ({e}); logging to stdout only",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt().json().with_env_filter(log_level).init();
            } else {
                tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else if use_json {
        tracing_subscriber::fmt().json().with_env_filter(log_level).init();
        None
    } else {
        tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        None
    }
}

// ── Panic hook + crash log ────────────────────────────────────────────────────

/// Panic hook that drops a `{data_dir}/crash.log` with message, location,
/// and backtrace. `check_crash_log` surfaces and removes it on the next run.
fn install_panic_hook(data_dir: std::path::PathBuf) {
    let original = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        // Keep the default stderr output, then persist.
        original(info);

        let crash_path = data_dir.join("crash.log");
        let msg = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("unknown panic");

        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());

        let backtrace = std::backtrace::Backtrace::capture();
        let content = format!(
            "tetherd panic at {location}\n\
             message: {msg}\n\
             version: {}\n\
             backtrace:\n{backtrace:#}\n",
            env!("CARGO_PKG_VERSION")
        );

        // Best effort; the process is going down either way.
        let _ = std::fs::write(&crash_path, &content);
    }));
}

/// Surface a crash.log left by a previous run: log it at error level and
/// delete it. Runs early in `run_serve()`, right after logging comes up.
fn check_crash_log(data_dir: &std::path::Path) {
    let crash_path = data_dir.join("crash.log");
    match std::fs::read_to_string(&crash_path) {
        Ok(content) => {
            tracing::error!(
                crash_report = %content.trim(),
                "previous run panicked — crash report attached"
            );
            let _ = std::fs::remove_file(&crash_path);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(err = %e, "could not read crash.log");
        }
    }
}

// ── tetherd serve ─────────────────────────────────────────────────────────────

async fn run_serve(
    port: Option<u16>,
    data_dir: Option<std::path::PathBuf>,
    log: Option<String>,
    bind_address: Option<String>,
) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "tetherd starting");

    let config = Arc::new(TetherdConfig::new(port, data_dir, log, bind_address));
    info!(
        data_dir = %config.data_dir.display(),
        port = config.port,
        threshold_meters = config.reminder.threshold_meters,
        "config loaded"
    );

    install_panic_hook(config.data_dir.clone());
    check_crash_log(&config.data_dir);

    let storage = Storage::new_with_slow_query(
        &config.data_dir,
        config.observability.slow_query_threshold_ms,
    )
    .await?;

    let store = TaskStore::new(storage.pool())
        .await
        .context("failed to load tasks")?;

    let broadcaster = Arc::new(EventBroadcaster::new());

    // ── Notification sinks ────────────────────────────────────────────────────
    // Every reminder always goes to the log and the SSE event stream; a
    // desktop command (e.g. notify-send) is added when configured.
    let mut sinks: Vec<Arc<dyn Notifier>> = vec![
        Arc::new(TracingNotifier),
        Arc::new(BroadcastNotifier::new(broadcaster.clone())),
    ];
    if let Some(cmd) = &config.notify.command {
        info!(command = %cmd, "notify command configured");
        sinks.push(Arc::new(CommandNotifier::new(cmd.clone())));
    }
    let notifier: Arc<dyn Notifier> = Arc::new(FanoutNotifier::new(sinks));

    let engine = Arc::new(ReminderEngine::with_threshold(
        notifier,
        config.reminder.threshold_meters,
    ));

    // Device position feed — unknown until the first fix arrives.
    let (location_tx, location_rx) = tokio::sync::watch::channel(None);

    let ctx = Arc::new(AppContext {
        config: config.clone(),
        store: store.clone(),
        broadcaster: broadcaster.clone(),
        engine: engine.clone(),
        location_tx,
        started_at: std::time::Instant::now(),
    });

    // ── Source bridge: the only caller of the engine in serve mode ───────────
    tokio::spawn(run_source_bridge(
        engine,
        store.subscribe(),
        location_rx,
        broadcaster,
    ));

    // ── DB file watcher: pick up CLI edits from other processes ──────────────
    // Keep the guard alive for the server's lifetime; None means external
    // edits need a daemon restart (non-fatal).
    let _store_watcher = StoreWatcher::start(&config.data_dir, store.clone());

    let run_result = start_rest_server(ctx).await;

    // ── WAL checkpoint on clean shutdown ──────────────────────────────────────
    if let Err(e) = storage.checkpoint_wal().await {
        tracing::warn!(err = %e, "WAL checkpoint on shutdown failed (non-fatal)");
    }

    run_result
}

// ── tetherd task ──────────────────────────────────────────────────────────────

async fn run_task(config: &TetherdConfig, action: TaskAction, quiet: bool) -> Result<()> {
    let storage = Storage::new(&config.data_dir).await?;
    let store = TaskStore::new(storage.pool()).await?;

    match action {
        TaskAction::Add { title, at } => {
            let title = title.trim();
            if title.is_empty() {
                anyhow::bail!("task title must not be empty");
            }
            let t = store.add_task(title, at).await?;
            if !quiet {
                println!("Added: {} — {}", short_id(&t.id), t.title);
                if let Some(c) = t.bound_location {
                    println!("Bound:  {c}");
                }
            }
        }

        TaskAction::List { open, done, json } => {
            let filter = TaskFilter {
                done: if open {
                    Some(false)
                } else if done {
                    Some(true)
                } else {
                    None
                },
            };
            let tasks = store.list_tasks(filter).await?;
            if json {
                println!("{}", serde_json::to_string(&tasks)?);
            } else if tasks.is_empty() {
                println!("No tasks found.");
            } else {
                println!("{:<10} {:<6} {:<22} TITLE", "ID", "STATE", "LOCATION");
                println!("{}", "-".repeat(72));
                for t in &tasks {
                    println!(
                        "{:<10} {:<6} {:<22} {}",
                        short_id(&t.id),
                        if t.done { "done" } else { "open" },
                        t.bound_location
                            .map(|c| c.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                        t.title
                    );
                }
                println!("\n{} task(s)", tasks.len());
            }
        }

        TaskAction::Show { id } => {
            let t = store.resolve_id(&id).await?;
            print_task_detail(&t);
        }

        TaskAction::Done { id } => {
            let t = store.resolve_id(&id).await?;
            let t = store.set_done(&t.id, true).await?;
            if !quiet {
                println!("Done: {} — {}", short_id(&t.id), t.title);
            }
        }

        TaskAction::Reopen { id } => {
            let t = store.resolve_id(&id).await?;
            let t = store.set_done(&t.id, false).await?;
            if !quiet {
                println!("Reopened: {} — {}", short_id(&t.id), t.title);
            }
        }

        TaskAction::Rename { id, title } => {
            let title = title.trim();
            if title.is_empty() {
                anyhow::bail!("task title must not be empty");
            }
            let t = store.resolve_id(&id).await?;
            let t = store.rename_task(&t.id, title).await?;
            if !quiet {
                println!("Renamed: {} — {}", short_id(&t.id), t.title);
            }
        }

        TaskAction::Bind { id, at } => {
            let t = store.resolve_id(&id).await?;
            let t = store.set_bound_location(&t.id, Some(at)).await?;
            if !quiet {
                println!("Bound: {} — {} @ {at}", short_id(&t.id), t.title);
            }
        }

        TaskAction::Unbind { id } => {
            let t = store.resolve_id(&id).await?;
            let t = store.set_bound_location(&t.id, None).await?;
            if !quiet {
                println!("Unbound: {} — {}", short_id(&t.id), t.title);
            }
        }

        TaskAction::Rm { id } => {
            let t = store.resolve_id(&id).await?;
            store.remove_task(&t.id).await?;
            if !quiet {
                println!("Removed: {} — {}", short_id(&t.id), t.title);
            }
        }
    }

    Ok(())
}

/// First 8 chars of a UUID — enough to be unique in a personal task list.
fn short_id(id: &str) -> &str {
    if id.len() > 8 {
        &id[..8]
    } else {
        id
    }
}

fn print_task_detail(t: &Task) {
    println!("ID:       {}", t.id);
    println!("Title:    {}", t.title);
    println!("State:    {}", if t.done { "done" } else { "open" });
    match t.bound_location {
        Some(c) => println!("Location: {c}"),
        None => println!("Location: -"),
    }
    println!("Created:  {}", format_ts(t.created_at));
    println!("Updated:  {}", format_ts(t.updated_at));
}

/// Format a unix timestamp as local-agnostic UTC, e.g. "2026-08-22 14:03".
fn format_ts(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}

// ── tetherd location ──────────────────────────────────────────────────────────

async fn run_location(config: &TetherdConfig, action: LocationAction, quiet: bool) -> Result<()> {
    let client = DaemonClient::new(config.port)?;
    if !client.is_reachable().await {
        anyhow::bail!("daemon is not running — start it with `tetherd serve`");
    }

    match action {
        LocationAction::Set { at } => {
            client.set_location(at).await?;
            if !quiet {
                println!("Location: {at}");
            }
        }
        LocationAction::Clear => {
            client.clear_location().await?;
            if !quiet {
                println!("Location: unknown");
            }
        }
    }

    Ok(())
}

// ── tetherd status ────────────────────────────────────────────────────────────

async fn run_status(config: &TetherdConfig, json: bool) -> i32 {
    let client = match DaemonClient::new(config.port) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e:#}");
            return 1;
        }
    };

    match client.health().await {
        Ok(result) => {
            let version = result["version"].as_str().unwrap_or("?");
            let total = result["tasks_total"].as_u64().unwrap_or(0);
            let open = result["tasks_open"].as_u64().unwrap_or(0);
            let away = result["away_task_ids"]
                .as_array()
                .map(|a| a.len())
                .unwrap_or(0);
            let uptime_str = format_uptime(result["uptime_secs"].as_u64().unwrap_or(0));

            if json {
                println!("{}", serde_json::to_string(&result).unwrap_or_default());
            } else {
                let fix = if result["has_fix"].as_bool().unwrap_or(false) {
                    "fix acquired"
                } else {
                    "no fix"
                };
                println!(
                    "tetherd {version} — Running ({open}/{total} tasks open, {away} away, {fix}, uptime {uptime_str})"
                );
            }
            0
        }
        Err(_) => {
            if json {
                println!(r#"{{"status":"not_running"}}"#);
            } else {
                println!("tetherd: not running");
            }
            1
        }
    }
}

/// Human uptime: "2h 14m", "45m 3s", "12s".
fn format_uptime(secs: u64) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{h}h {m}m")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}
