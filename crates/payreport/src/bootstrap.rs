use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Application directory under `home`: `<home>/.payreport`.
pub fn app_dir_in(home: &Path) -> PathBuf {
    home.join(".payreport")
}

/// Ensure `~/.payreport/` and `~/.payreport/logs/` exist.
pub fn ensure_directories() -> anyhow::Result<()> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    ensure_directories_in(&home)
}

fn ensure_directories_in(home: &Path) -> anyhow::Result<()> {
    let app_dir = app_dir_in(home);
    std::fs::create_dir_all(app_dir.join("logs"))
        .with_context(|| format!("creating {}", app_dir.display()))?;
    Ok(())
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map Python-style level names to a tracing filter directive.
fn level_directive(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" | "WARN" => "warn".to_string(),
        "ERROR" | "CRITICAL" => "error".to_string(),
        _ => log_level.to_lowercase(),
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Logs go to stderr, or are appended to `log_file` when one is given, so
/// stdout carries only report text. Falls back to `info` when the level is
/// not recognised.
pub fn setup_logging(log_level: &str, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_new(level_directive(log_level)).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            registry
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            registry
                .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
