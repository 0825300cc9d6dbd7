//! Logging system configuration and initialization
//!
//! This module provides the logging setup with:
//! - Console output and optional file output with rotation on startup
//! - Configuration file based log level control
//! - Structured JSON file logs (optional)
//! - Local timezone timestamps

use std::io::Stdout;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Local};
use lazy_static::lazy_static;
use tracing::{Subscriber, info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{
        self,
        format::{DefaultFields, Format, Full},
        time::FormatTime,
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

/// Active log file; the previous run's file is renamed with a timestamp suffix
pub const LOG_FILE_NAME: &str = "classifieds-crawler.log";

// Global guard to keep the log file writer alive
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> = Mutex::new(Vec::new());
}

/// Timestamps in the machine's local timezone
struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Get the log directory relative to the executable location
pub fn get_log_directory() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    exe_dir.join("logs")
}

fn resolve_log_directory(config: &LoggingConfig) -> PathBuf {
    config.log_dir.clone().unwrap_or_else(get_log_directory)
}

/// Initialize the logging system with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Rename an existing log file to `{stem}.{timestamp}.log`
fn rotate_existing_log_file(log_dir: &Path, log_file_name: &str) -> Result<Option<PathBuf>> {
    let log_file_path = log_dir.join(log_file_name);
    if !log_file_path.exists() {
        return Ok(None);
    }

    let metadata = std::fs::metadata(&log_file_path).context("Failed to get log file metadata")?;
    let file_time = metadata
        .created()
        .or_else(|_| metadata.modified())
        .unwrap_or_else(|_| std::time::SystemTime::now());
    let datetime: DateTime<Local> = file_time.into();

    let file_stem = log_file_name.trim_end_matches(".log");
    let timestamped_path = log_dir.join(format!("{}.{}.log", file_stem, datetime.format("%Y%m%dT%H%M%S")));

    std::fs::rename(&log_file_path, &timestamped_path).with_context(|| {
        format!(
            "Failed to rotate log file {} to {}",
            log_file_path.display(),
            timestamped_path.display()
        )
    })?;

    Ok(Some(timestamped_path))
}

/// Filter directives applied when `RUST_LOG` is not set
///
/// Noisy HTTP and HTML targets are capped unless the level is `trace`,
/// in which case everything passes through.
pub fn filter_directives(config: &LoggingConfig) -> Vec<String> {
    let mut directives = vec![config.level.clone()];

    if !config.level.to_lowercase().contains("trace") {
        let mut modules: Vec<(&String, &String)> = config.module_filters.iter().collect();
        modules.sort();
        directives.extend(modules.into_iter().map(|(module, level)| format!("{module}={level}")));

        // Keep our application logs at the requested level
        directives.push(format!("classifieds_crawler_lib={}", config.level));
        directives.push(format!("classifieds_crawler={}", config.level));
    }

    directives
}

fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::new("");
    for directive in filter_directives(config) {
        filter = filter.add_directive(
            directive
                .parse()
                .with_context(|| format!("Invalid log filter directive '{directive}'"))?,
        );
    }
    Ok(filter)
}

type ConsoleLayer<S> = fmt::Layer<S, DefaultFields, Format<Full, LocalTimeFormatter>, fn() -> Stdout>;

fn console_layer<S>() -> ConsoleLayer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fmt::Layer::new()
        .with_writer(std::io::stdout as fn() -> Stdout)
        .with_timer(LocalTimeFormatter)
        .with_target(false)
}

/// Initialize logging with custom configuration
///
/// `RUST_LOG` overrides the configured filters:
/// ```bash
/// # Show detailed HTTP logs
/// RUST_LOG="debug,reqwest=debug,hyper=debug" classifieds-crawler scrape
/// ```
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_env_filter(config)?;
    let registry = Registry::default().with(env_filter);

    let mut log_dir = None;
    let mut rotated = None;
    let mut removed = 0;

    match (config.file_output, config.console_output) {
        (true, _) => {
            let dir = resolve_log_directory(config);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

            rotated = rotate_existing_log_file(&dir, LOG_FILE_NAME)?;
            if config.auto_cleanup_logs {
                removed = cleanup_old_logs(&dir, config.max_files)?;
            }

            let file_appender = rolling::never(&dir, LOG_FILE_NAME);
            let (file_writer, file_guard) = non_blocking(file_appender);

            // Store the guard globally to prevent it from being dropped
            LOG_GUARDS
                .lock()
                .map_err(|_| anyhow!("Log guard registry poisoned"))?
                .push(file_guard);

            if config.json_format {
                let file_layer = fmt::Layer::new()
                    .json()
                    .with_writer(file_writer)
                    .with_timer(LocalTimeFormatter)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false);
                registry
                    .with(file_layer)
                    .with(config.console_output.then(console_layer))
                    .try_init()?;
            } else {
                // File layer with minimal formatting (time + level + message only)
                let file_layer = fmt::Layer::new()
                    .with_writer(file_writer)
                    .with_timer(LocalTimeFormatter)
                    .with_target(false)
                    .with_ansi(false);
                registry
                    .with(file_layer)
                    .with(config.console_output.then(console_layer))
                    .try_init()?;
            }

            log_dir = Some(dir);
        }
        (false, true) => {
            registry.with(console_layer()).try_init()?;
        }
        (false, false) => {
            return Err(anyhow!("No logging output configured"));
        }
    }

    info!("Logging system initialized (level: {})", config.level);
    if let Some(dir) = log_dir {
        info!("Log directory: {:?}", dir);
        info!("JSON format: {}", config.json_format);
    }
    if let Some(path) = rotated {
        info!("Rotated existing log file to: {:?}", path);
    }
    if removed > 0 {
        info!("Removed {} old log files (keeping {})", removed, config.max_files);
    }

    Ok(())
}

/// Delete the oldest `.log` files beyond `max_files`, returning how many went
fn cleanup_old_logs(log_dir: &Path, max_files: u32) -> Result<usize> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let mut log_files = Vec::new();
    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();

        let is_log = path.is_file() && path.extension().is_some_and(|ext| ext == "log");
        if is_log {
            if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
                log_files.push((path, modified));
            }
        }
    }

    // Newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (path, _) in log_files.iter().skip(max_files as usize) {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove old log file {:?}: {}", path, e);
        } else {
            removed += 1;
        }
    }

    Ok(removed)
}

/// Log system information for diagnostics
pub fn log_system_info() {
    info!("=== Classifieds Crawler System Information ===");
    info!("Application version: {}", env!("CARGO_PKG_VERSION"));
    info!("Operating system: {}", std::env::consts::OS);
    info!("Architecture: {}", std::env::consts::ARCH);

    if let Ok(current_dir) = std::env::current_dir() {
        info!("Working directory: {:?}", current_dir);
    }
    info!("===============================================");
}
