//! Pluggable log sinks and the cloneable [`Logger`] handle
//!
//! A [`LogProvider`] receives fully built [`LogRecord`]s. Components hold a
//! [`Logger`] (dependency injection) or fall back to the process-wide logger
//! in [`global`](crate::global).

use crate::correlation::LogCorrelation;
use crate::global;
use crate::record::LogRecord;
use crate::severity::Severity;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Errors that can occur while setting up a log sink
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for logger operations
pub type Result<T> = std::result::Result<T, LoggerError>;

/// Destination for log records
///
/// Implementations must be callable from any thread. Logging never fails
/// from the caller's point of view; sinks deal with their own errors.
pub trait LogProvider: Send + Sync {
    fn log(&self, record: &LogRecord);

    fn flush(&self) {}
}

/// Cheap-clone handle around a shared [`LogProvider`]
#[derive(Clone)]
pub struct Logger {
    provider: Arc<dyn LogProvider>,
    min_severity: Severity,
}

impl Logger {
    pub fn new<P: LogProvider + 'static>(provider: P) -> Self {
        Self::from_arc(Arc::new(provider))
    }

    pub fn from_arc(provider: Arc<dyn LogProvider>) -> Self {
        Self {
            provider,
            min_severity: Severity::Debug,
        }
    }

    /// Logger that forwards to the `tracing` subscriber
    pub fn tracing() -> Self {
        Self::new(TracingLogProvider)
    }

    /// Drop records below `severity` before they are formatted
    pub fn with_min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = severity;
        self
    }

    pub fn min_severity(&self) -> Severity {
        self.min_severity
    }

    pub fn enabled(&self, severity: Severity) -> bool {
        severity >= self.min_severity
    }

    pub fn log(&self, record: &LogRecord) {
        if self.enabled(record.severity) {
            self.provider.log(record);
        }
    }

    /// Build and emit a record; the message is only formatted when enabled
    pub fn log_args<C: LogCorrelation + ?Sized>(
        &self,
        severity: Severity,
        component: &str,
        correlation: &C,
        location: String,
        args: fmt::Arguments<'_>,
    ) {
        if !self.enabled(severity) {
            return;
        }
        let record = LogRecord::new(severity, component, correlation, location, args.to_string());
        self.provider.log(&record);
    }

    pub fn flush(&self) {
        self.provider.flush();
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("min_severity", &self.min_severity)
            .finish_non_exhaustive()
    }
}

/// Forwards records to `tracing` as events with structured fields
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogProvider;

macro_rules! forward_event {
    ($level:expr, $record:ident) => {
        tracing::event!(
            target: "cpio",
            $level,
            severity = %$record.severity,
            component = %$record.component,
            correlation_id = %$record.correlation_id,
            parent_activity_id = %$record.parent_activity_id,
            activity_id = %$record.activity_id,
            location = %$record.location,
            "{}",
            $record.message
        )
    };
}

impl LogProvider for TracingLogProvider {
    fn log(&self, record: &LogRecord) {
        match record.severity.to_tracing_level() {
            tracing::Level::TRACE => forward_event!(tracing::Level::TRACE, record),
            tracing::Level::DEBUG => forward_event!(tracing::Level::DEBUG, record),
            tracing::Level::INFO => forward_event!(tracing::Level::INFO, record),
            tracing::Level::WARN => forward_event!(tracing::Level::WARN, record),
            tracing::Level::ERROR => forward_event!(tracing::Level::ERROR, record),
        }
    }
}

/// Appends records to a file in JSON Lines format
pub struct JsonLinesLogProvider {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
    write_errors: AtomicU64,
}

impl JsonLinesLogProvider {
    /// Open (or create) `path` for appending, creating parent directories
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
            write_errors: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records that could not be written
    pub fn write_errors(&self) -> u64 {
        self.write_errors.load(Ordering::Relaxed)
    }

    fn write_record(&self, record: &LogRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{}", line)?;
        Ok(())
    }
}

impl LogProvider for JsonLinesLogProvider {
    fn log(&self, record: &LogRecord) {
        if self.write_record(record).is_err() {
            self.write_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn flush(&self) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if writer.flush().is_err() {
            self.write_errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Drop for JsonLinesLogProvider {
    fn drop(&mut self) {
        LogProvider::flush(self);
    }
}

/// Anything the macros accept after `logger =`
#[doc(hidden)]
pub trait MaybeLogger {
    fn maybe_logger(&self) -> Option<&Logger>;
}

impl MaybeLogger for Logger {
    fn maybe_logger(&self) -> Option<&Logger> {
        Some(self)
    }
}

impl MaybeLogger for Option<Logger> {
    fn maybe_logger(&self) -> Option<&Logger> {
        self.as_ref()
    }
}

impl<T: MaybeLogger + ?Sized> MaybeLogger for &T {
    fn maybe_logger(&self) -> Option<&Logger> {
        (**self).maybe_logger()
    }
}

impl<T: MaybeLogger + ?Sized> MaybeLogger for Arc<T> {
    fn maybe_logger(&self) -> Option<&Logger> {
        (**self).maybe_logger()
    }
}

/// Emit through `logger`, or through the global logger when `None`
#[doc(hidden)]
pub fn emit<C: LogCorrelation + ?Sized>(
    logger: Option<&Logger>,
    severity: Severity,
    component: &str,
    correlation: &C,
    file: &'static str,
    line: u32,
    args: fmt::Arguments<'_>,
) {
    let location = || format!("{}:{}", file, line);
    match logger {
        Some(logger) => logger.log_args(severity, component, correlation, location(), args),
        None => {
            if let Some(logger) = global::logger() {
                logger.log_args(severity, component, correlation, location(), args);
            }
        }
    }
}
