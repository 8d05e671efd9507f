use crate::reminder::DEFAULT_DEPARTURE_THRESHOLD_METERS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, warn};

const DEFAULT_PORT: u16 = 4710;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── ReminderConfig ───────────────────────────────────────────────────────────

/// Geofence tuning (`[reminder]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// Departure distance in meters; a task is away only when strictly
    /// farther than this from the last fix (default: 100.0).
    pub threshold_meters: f64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            threshold_meters: DEFAULT_DEPARTURE_THRESHOLD_METERS,
        }
    }
}

// ─── NotifyConfig ─────────────────────────────────────────────────────────────

/// Notification delivery (`[notify]` in config.toml).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// External program invoked as `<command> <title> <body>` for each
    /// reminder, e.g. `"notify-send"`. None = log + SSE broadcast only.
    pub command: Option<String>,
}

// ─── ObservabilityConfig ──────────────────────────────────────────────────────

/// `[observability]` section of config.toml.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Queries slower than this many milliseconds are logged at WARN.
    /// 0 turns slow-query logging off. Default: 100.
    pub slow_query_threshold_ms: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            slow_query_threshold_ms: 100,
        }
    }
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// Shape of `{data_dir}/config.toml`. Every field is optional; TOML sits
/// between CLI/env (wins) and the built-in defaults (loses).
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// REST server port (default: 4710).
    port: Option<u16>,
    /// Log level filter string, e.g. "debug", "info,tetherd=trace" (default: "info").
    log: Option<String>,
    /// Bind address for the REST server (default: "127.0.0.1"; use "0.0.0.0" for LAN access).
    bind_address: Option<String>,
    /// "pretty" (default) or "json" log output.
    log_format: Option<String>,
    /// Geofence tuning (`[reminder]`).
    reminder: Option<ReminderConfig>,
    /// Notification delivery (`[notify]`).
    notify: Option<NotifyConfig>,
    /// Slow-query logging (`[observability]`).
    observability: Option<ObservabilityConfig>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "config.toml did not parse — ignoring it");
            None
        }
    }
}

/// Clamp a configured threshold to something usable. Zero, negative, and
/// non-finite values would make every bound task away forever or never.
fn effective_threshold(raw: f64) -> f64 {
    if raw.is_finite() && raw > 0.0 {
        raw
    } else {
        warn!(
            threshold = raw,
            default = DEFAULT_DEPARTURE_THRESHOLD_METERS,
            "invalid reminder.threshold_meters — using default"
        );
        DEFAULT_DEPARTURE_THRESHOLD_METERS
    }
}

// ─── TetherdConfig ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TetherdConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub log: String,
    /// Bind address for the REST server (TETHERD_BIND env var, default: "127.0.0.1").
    pub bind_address: String,
    /// Log output format: "pretty" (default) | "json".
    pub log_format: String,
    /// Geofence tuning — departure threshold.
    pub reminder: ReminderConfig,
    /// Notification delivery — external command.
    pub notify: NotifyConfig,
    /// Observability: slow query threshold.
    pub observability: ObservabilityConfig,
}

impl TetherdConfig {
    /// Resolve the effective config. Each setting takes the first value
    /// present in: clap-provided CLI/env (`Some` here), then
    /// `{data_dir}/config.toml`, then the built-in default.
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        log: Option<String>,
        bind_address: Option<String>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        // data_dir has to resolve first: the TOML layer lives inside it.
        let toml = load_toml(&data_dir).unwrap_or_default();

        let port = port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let bind_address = bind_address
            .or(std::env::var("TETHERD_BIND").ok().filter(|s| !s.is_empty()))
            .or(toml.bind_address)
            .unwrap_or_else(default_bind_address);

        let log_format = std::env::var("TETHERD_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let mut reminder = toml.reminder.unwrap_or_default();
        reminder.threshold_meters = effective_threshold(reminder.threshold_meters);

        let notify = toml.notify.unwrap_or_default();
        let observability = toml.observability.unwrap_or_default();

        Self {
            port,
            data_dir,
            log,
            bind_address,
            log_format,
            reminder,
            notify,
            observability,
        }
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/tetherd
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("tetherd");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/tetherd or ~/.local/share/tetherd
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("tetherd");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("tetherd");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\tetherd
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("tetherd");
        }
    }
    // Fallback
    PathBuf::from(".tetherd")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_threshold_passes_valid_values() {
        assert_eq!(effective_threshold(25.0), 25.0);
        assert_eq!(effective_threshold(0.5), 0.5);
    }

    #[test]
    fn test_effective_threshold_rejects_unusable_values() {
        for raw in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            assert_eq!(
                effective_threshold(raw),
                DEFAULT_DEPARTURE_THRESHOLD_METERS
            );
        }
    }
}
