//! Process logging: one timestamped file per start under `logs_dir`, at
//! most 10 files retained, mirrored to stderr.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

const MAX_LOG_FILES: usize = 10;
const VALID_LEVELS: &[&str] = &["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];

/// Map the configured level onto a tracing filter directive.
fn filter_for(level: &str) -> EnvFilter {
    let level = level.to_ascii_uppercase();
    let level = if VALID_LEVELS.contains(&level.as_str()) {
        level
    } else {
        eprintln!("Warning: invalid log level '{level}'; using INFO.");
        "INFO".to_string()
    };
    let directive = match level.as_str() {
        "DEBUG" => "debug",
        "WARNING" => "warn",
        "ERROR" => "error",
        // tracing has no CRITICAL; error is the closest severity.
        "CRITICAL" => "error",
        _ => "info",
    };
    EnvFilter::new(directive)
}

/// Delete the oldest `chameleon_*.log` files so at most `MAX_LOG_FILES`
/// remain once the new file is created.
fn prune_old_logs(logs_path: &Path) {
    let mut logs: Vec<PathBuf> = match fs::read_dir(logs_path) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("chameleon_") && n.ends_with(".log"))
            })
            .collect(),
        Err(_) => return,
    };
    // Names embed the start timestamp, so lexicographic order is age order.
    logs.sort();
    if logs.len() >= MAX_LOG_FILES {
        let excess = logs.len() - (MAX_LOG_FILES - 1);
        for old in logs.into_iter().take(excess) {
            if let Err(e) = fs::remove_file(&old) {
                eprintln!("Warning: could not delete old log file {}: {e}", old.display());
            }
        }
    }
}

/// Install the global subscriber.  Returns the log file path.
pub fn setup_logging(log_level: &str, logs_dir: &str) -> Result<PathBuf> {
    let logs_path = Path::new(logs_dir);
    fs::create_dir_all(logs_path)
        .with_context(|| format!("creating logs directory '{logs_dir}'"))?;

    prune_old_logs(logs_path);

    let stamp_format = time::macros::format_description!(
        "[year][month][day]_[hour][minute][second]_[subsecond digits:6]"
    );
    let stamp = time::OffsetDateTime::now_utc()
        .format(&stamp_format)
        .unwrap_or_else(|_| "unknown".to_string());
    let log_file_path = logs_path.join(format!("chameleon_{stamp}.log"));

    let file = fs::File::create(&log_file_path)
        .with_context(|| format!("creating log file '{}'", log_file_path.display()))?;

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(Mutex::new(file));
    // Stderr keeps stdout clean for the stdio transport.
    let stderr_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    let subscriber = Registry::default()
        .with(filter_for(log_level))
        .with(file_layer)
        .with(stderr_layer);
    tracing::subscriber::set_global_default(subscriber)
        .context("setting global tracing subscriber")?;

    tracing::info!(
        "logging initialized; file: {}, level: {log_level}",
        log_file_path.display()
    );
    Ok(log_file_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prune_keeps_at_most_nine_before_new_file() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..12 {
            fs::write(dir.path().join(format!("chameleon_202401{i:02}_000000_000000.log")), "x")
                .unwrap();
        }
        // Unrelated files are left alone.
        fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        prune_old_logs(dir.path());

        let remaining: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".log"))
            .collect();
        assert_eq!(remaining.len(), MAX_LOG_FILES - 1);
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn invalid_level_falls_back_to_info() {
        // Should not panic and should build a filter.
        let _ = filter_for("verbose");
        let _ = filter_for("critical");
    }
}
