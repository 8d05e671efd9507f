// SPDX-License-Identifier: MIT
//! doctor.rs — pre-flight diagnostic checks for `tetherd doctor`.
//!
//! Takes only the resolved config, no AppContext: the whole point is to
//! diagnose an environment where the daemon may not be able to start at
//! all (port taken, unwritable data dir, broken notify command).

use std::process::Command;

use crate::config::TetherdConfig;

/// One row of the doctor report.
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

/// Run every check against the resolved config.
pub fn run_doctor(config: &TetherdConfig) -> Vec<CheckResult> {
    vec![
        check_port_available(config),
        check_data_dir_writable(config),
        check_database_accessible(config),
        check_notify_command(config),
    ]
}

// ─── Individual checks ────────────────────────────────────────────────────────

/// Check 1: the configured port is available (not in use by another process).
fn check_port_available(config: &TetherdConfig) -> CheckResult {
    let addr = format!("{}:{}", config.bind_address, config.port);
    let passed = std::net::TcpListener::bind(&addr).is_ok();
    CheckResult {
        name: "Port available",
        passed,
        detail: if passed {
            format!("{addr} is free")
        } else {
            format!("{addr} is in use — is tetherd already running?")
        },
    }
}

/// Check 2: the data directory exists (or can be created) and is writable.
fn check_data_dir_writable(config: &TetherdConfig) -> CheckResult {
    let data_dir = &config.data_dir;
    if let Err(e) = std::fs::create_dir_all(data_dir) {
        return CheckResult {
            name: "Data directory writable",
            passed: false,
            detail: format!("cannot create {}: {e}", data_dir.display()),
        };
    }
    // Existence isn't enough; prove we can actually write a file there.
    let test_path = data_dir.join(".doctor_write_test");
    match std::fs::write(&test_path, b"ok") {
        Ok(_) => {
            let _ = std::fs::remove_file(&test_path);
            CheckResult {
                name: "Data directory writable",
                passed: true,
                detail: format!("{} is writable", data_dir.display()),
            }
        }
        Err(e) => CheckResult {
            name: "Data directory writable",
            passed: false,
            detail: format!("cannot write to {}: {e}", data_dir.display()),
        },
    }
}

/// Check 3: the SQLite database file is accessible. A missing file passes:
/// it is created on first start.
fn check_database_accessible(config: &TetherdConfig) -> CheckResult {
    let db_path = config.data_dir.join("tether.db");
    if !db_path.exists() {
        return CheckResult {
            name: "SQLite DB accessible",
            passed: true,
            detail: format!(
                "{} does not exist yet (created on first start)",
                db_path.display()
            ),
        };
    }
    match std::fs::File::open(&db_path) {
        Ok(_) => CheckResult {
            name: "SQLite DB accessible",
            passed: true,
            detail: format!("{} exists and is readable", db_path.display()),
        },
        Err(e) => CheckResult {
            name: "SQLite DB accessible",
            passed: false,
            detail: format!("cannot open {}: {e}", db_path.display()),
        },
    }
}

/// Check 4: the configured notify command (if any) is installed and on PATH.
fn check_notify_command(config: &TetherdConfig) -> CheckResult {
    let Some(cmd) = &config.notify.command else {
        return CheckResult {
            name: "Notify command",
            passed: true,
            detail: "not configured (reminders go to the log and SSE stream)".to_string(),
        };
    };
    match Command::new(cmd).arg("--version").output() {
        Ok(out) if out.status.success() => {
            let version = String::from_utf8_lossy(&out.stdout)
                .lines()
                .next()
                .unwrap_or("unknown version")
                .trim()
                .to_string();
            CheckResult {
                name: "Notify command",
                passed: true,
                detail: format!("{cmd}: {version}"),
            }
        }
        _ => CheckResult {
            name: "Notify command",
            passed: false,
            detail: format!("{cmd} not found in PATH"),
        },
    }
}

// ─── Output ───────────────────────────────────────────────────────────────────

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Render the check rows as a colored table on stdout.
pub fn print_doctor_results(results: &[CheckResult]) {
    println!();
    println!("{BOLD}tetherd doctor — pre-flight checks{RESET}");
    println!("{}", "─".repeat(60));

    for r in results {
        let (symbol, color) = if r.passed {
            ("✓", GREEN)
        } else {
            ("✗", RED)
        };
        println!(
            "  {color}{symbol}{RESET}  {:<30}  {}",
            r.name, r.detail
        );
    }

    println!("{}", "─".repeat(60));

    let failed = results.iter().filter(|r| !r.passed).count();
    if failed == 0 {
        println!("{GREEN}All checks passed.{RESET}");
    } else {
        println!("{RED}{failed} check(s) failed.{RESET}");
    }
    println!();
}
