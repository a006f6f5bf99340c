pub mod models;
pub mod services;

pub use models::{DetectionRequest, DetectionResult, RiskLevel, RuleType};
pub use services::{AppConfig, ConfigStore, Detector, DetectorError};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_PREFIX: &str = "humanscore_";
const LOGS_TO_KEEP: usize = 30;

fn env_flag(name: &str) -> bool {
    matches!(std::env::var(name).as_deref(), Ok("1") | Ok("true") | Ok("TRUE"))
}

/// Initialize logging with a timestamped file per session plus console output.
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_logging() {
    if LOG_GUARD.get().is_some() {
        return;
    }
    let disable_file_log = env_flag("HUMANSCORE_DISABLE_FILE_LOG");
    let disable_cleanup = env_flag("HUMANSCORE_DISABLE_LOG_CLEANUP");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if disable_file_log {
        init_console_only_logging(env_filter);
        info!("File logging disabled via HUMANSCORE_DISABLE_FILE_LOG");
        return;
    }

    let logs_dir = match std::env::var("HUMANSCORE_LOG_DIR") {
        Ok(p) if !p.trim().is_empty() => PathBuf::from(p),
        _ => logs_dir(),
    };

    if let Err(e) = fs::create_dir_all(&logs_dir) {
        eprintln!("Failed to create logs directory: {}", e);
        init_console_only_logging(env_filter);
        info!("Falling back to console-only logging (log dir not writable)");
        return;
    }

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let log_filename = format!("{}{}.log", LOG_PREFIX, timestamp);

    // One file per session; writes go through a non-blocking worker
    let file_appender = rolling::never(&logs_dir, &log_filename);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions))
        .with_target(true);

    if tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .is_err()
    {
        // Another subscriber is already installed
        return;
    }
    let _ = LOG_GUARD.set(file_guard);

    info!("=== HumanScore logging started ===");
    info!("Log file: {}", logs_dir.join(&log_filename).display());
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    if !disable_cleanup {
        std::thread::spawn(move || cleanup_old_logs(&logs_dir, LOGS_TO_KEEP));
    }
}

fn logs_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("humanscore").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Remove the oldest session logs, keeping the newest `keep`.
fn cleanup_old_logs(logs_dir: &Path, keep: usize) -> usize {
    let mut entries: Vec<_> = match fs::read_dir(logs_dir) {
        Ok(rd) => rd.filter_map(|e| e.ok()).collect(),
        Err(_) => return 0,
    };

    entries.retain(|e| {
        let name = e.file_name().to_string_lossy().to_string();
        name.starts_with(LOG_PREFIX) && name.ends_with(".log")
    });
    if entries.len() <= keep {
        return 0;
    }

    // Names embed the session timestamp, so lexical order is chronological
    entries.sort_by_key(|e| e.file_name());

    let remove_count = entries.len() - keep;
    entries
        .into_iter()
        .take(remove_count)
        .filter(|e| fs::remove_file(e.path()).is_ok())
        .count()
}

fn init_console_only_logging(env_filter: EnvFilter) {
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions))
        .with_target(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_keeps_newest_logs() {
        let dir = std::env::temp_dir().join(format!("humanscore-logs-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        for i in 0..5 {
            fs::write(dir.join(format!("{}2024010{}_000000.log", LOG_PREFIX, i)), "x").unwrap();
        }
        fs::write(dir.join("other.log"), "x").unwrap();

        assert_eq!(cleanup_old_logs(&dir, 2), 3);
        let mut left: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        left.sort();
        assert_eq!(
            left,
            vec![
                "humanscore_20240103_000000.log".to_string(),
                "humanscore_20240104_000000.log".to_string(),
                "other.log".to_string(),
            ]
        );
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_cleanup_missing_dir() {
        let dir = std::env::temp_dir().join(format!("humanscore-missing-{}", uuid::Uuid::new_v4()));
        assert_eq!(cleanup_old_logs(&dir, 1), 0);
    }
}
