/*!
 * Logging and tracing initialization
 *
 * Two layers are set up here: the `tracing` subscriber that every crate in
 * the workspace emits diagnostics through, and the process-wide CPIO
 * [`Logger`] used by the `cpio_*!` macros. By default the CPIO logger
 * forwards its records into `tracing`; with `records_file` set they are
 * appended to a JSON lines file instead.
 */

use std::fs::File;
use std::path::Path;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::{LogFormat, LogLevel, LoggingConfig};
use crate::error::{CpioError, Result};
use cpio_observability::{global, JsonLinesLogProvider, Logger, Severity};

/// Targets the configured level applies to when `RUST_LOG` is unset
const CPIO_TARGETS: &[&str] = &[
    "cpio",
    "cpio_core_async",
    "cpio_core_resilience",
    "cpio_observability",
];

/// Initialize structured logging based on configuration
pub fn init_logging(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let log_level = if verbose {
        Level::DEBUG
    } else {
        config.level.to_tracing_level()
    };

    let env_filter = build_env_filter(log_level)?;

    match (&config.file, config.format) {
        (Some(log_path), _) => init_file_logging(log_path, env_filter)?,
        (None, LogFormat::Json) => init_stdout_json_logging(env_filter)?,
        (None, LogFormat::Compact) => init_stdout_logging(env_filter)?,
    }

    install_record_logger(config, verbose)
}

/// `RUST_LOG` wins; otherwise every workspace target at `level`
pub fn build_env_filter(level: Level) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(level)))
        .map_err(|e| CpioError::Logging(format!("Failed to create log filter: {}", e)))
}

fn default_directives(level: Level) -> String {
    CPIO_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Lowest CPIO severity that passes a given log level
pub fn min_severity(level: LogLevel) -> Severity {
    match level {
        LogLevel::Error => Severity::Error,
        LogLevel::Warn => Severity::Warning,
        LogLevel::Info => Severity::Info,
        LogLevel::Debug | LogLevel::Trace => Severity::Debug,
    }
}

/// Build the CPIO logger described by `config`
pub fn record_logger(config: &LoggingConfig, verbose: bool) -> Result<Logger> {
    let severity = if verbose {
        Severity::Debug
    } else {
        min_severity(config.level)
    };

    let logger = match &config.records_file {
        Some(path) => Logger::new(JsonLinesLogProvider::new(path)?),
        None => Logger::tracing(),
    };
    Ok(logger.with_min_severity(severity))
}

/// Install the process-wide CPIO logger
fn install_record_logger(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let logger = record_logger(config, verbose)?;
    global::init(logger).map_err(|e| CpioError::Logging(e.to_string()))
}

/// Flush and remove the process-wide CPIO logger
pub fn shutdown_logging() {
    if let Some(logger) = global::shutdown() {
        logger.flush();
    }
}

/// Initialize logging to stdout
fn init_stdout_logging(env_filter: EnvFilter) -> Result<()> {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| CpioError::Logging(e.to_string()))
}

fn init_stdout_json_logging(env_filter: EnvFilter) -> Result<()> {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::NONE)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| CpioError::Logging(e.to_string()))
}

/// Initialize logging to a file
fn init_file_logging(log_path: &Path, env_filter: EnvFilter) -> Result<()> {
    let file = File::create(log_path)
        .map_err(|e| CpioError::Logging(format!("Failed to create log file: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_writer(file)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(false) // No ANSI colors in file
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| CpioError::Logging(e.to_string()))
}

/// Initialize logging with custom format for testing
#[cfg(test)]
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cpio=debug"));

        let fmt_layer = fmt::layer().with_test_writer().with_target(false).compact();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .ok(); // Ignore error if already initialized
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpio_core_async::ActivityId;
    use tempfile::TempDir;

    #[test]
    fn test_default_directives() {
        let directives = default_directives(Level::WARN);
        assert!(directives.starts_with("cpio=WARN,"));
        assert!(directives.contains("cpio_core_resilience=WARN"));
        assert_eq!(directives.split(',').count(), CPIO_TARGETS.len());
    }

    #[test]
    fn test_build_env_filter() {
        assert!(build_env_filter(Level::INFO).is_ok());
    }

    #[test]
    fn test_min_severity() {
        assert_eq!(min_severity(LogLevel::Error), Severity::Error);
        assert_eq!(min_severity(LogLevel::Warn), Severity::Warning);
        assert_eq!(min_severity(LogLevel::Info), Severity::Info);
        assert_eq!(min_severity(LogLevel::Trace), Severity::Debug);
    }

    #[test]
    fn test_record_logger_verbose_overrides_level() {
        let config = LoggingConfig {
            level: LogLevel::Error,
            ..Default::default()
        };
        assert_eq!(
            record_logger(&config, false).unwrap().min_severity(),
            Severity::Error
        );
        assert_eq!(
            record_logger(&config, true).unwrap().min_severity(),
            Severity::Debug
        );
    }

    #[test]
    fn test_record_logger_writes_json_lines() {
        init_test_logging();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records").join("cpio.jsonl");
        let config = LoggingConfig {
            records_file: Some(path.clone()),
            ..Default::default()
        };

        let logger = record_logger(&config, false).unwrap();
        let id = ActivityId::generate();
        cpio_observability::cpio_info!(logger = &logger; "Logging", id, "written {}", 1);
        cpio_observability::cpio_debug!(logger = &logger; "Logging", id, "filtered");
        logger.flush();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["message"], "written 1");
        assert_eq!(value["component"], "Logging");
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Error.to_tracing_level(), Level::ERROR);
        assert_eq!(LogLevel::Info.to_tracing_level(), Level::INFO);
        assert_eq!(LogLevel::Debug.to_tracing_level(), Level::DEBUG);
    }
}
