//! Testing utilities for log assertions
//!
//! [`CapturingLogProvider`] keeps every record in memory so tests can check
//! what a component logged, at which severity and under which correlation.

use crate::logger::{LogProvider, Logger};
use crate::record::LogRecord;
use crate::severity::Severity;
use cpio_core_async::ActivityId;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// In-memory log sink
///
/// Clones share the same storage, so a clone can be handed to a [`Logger`]
/// while the test keeps the original for inspection.
///
/// ## Example
///
/// ```
/// use cpio_observability::{cpio_error, testing::CapturingLogProvider, Severity};
/// use cpio_core_async::ActivityId;
///
/// let capture = CapturingLogProvider::new();
/// let logger = capture.logger();
///
/// cpio_error!(logger = logger; "Example", ActivityId::ZERO, "disk {} full", "/tmp");
///
/// assert_eq!(capture.count(), 1);
/// assert_eq!(capture.with_severity(Severity::Error)[0].message, "disk /tmp full");
/// ```
#[derive(Debug, Clone, Default)]
pub struct CapturingLogProvider {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl CapturingLogProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logger writing into this capture
    pub fn logger(&self) -> Logger {
        Logger::new(self.clone())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All captured records
    pub fn records(&self) -> Vec<LogRecord> {
        self.lock().clone()
    }

    /// Messages of all captured records, in order
    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|r| r.message.clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Find records matching a predicate
    pub fn find<F>(&self, predicate: F) -> Vec<LogRecord>
    where
        F: Fn(&LogRecord) -> bool,
    {
        self.lock().iter().filter(|r| predicate(r)).cloned().collect()
    }

    pub fn with_severity(&self, severity: Severity) -> Vec<LogRecord> {
        self.find(|r| r.severity == severity)
    }

    pub fn for_component(&self, component: &str) -> Vec<LogRecord> {
        self.find(|r| r.component == component)
    }

    pub fn for_correlation(&self, correlation_id: ActivityId) -> Vec<LogRecord> {
        self.find(|r| r.correlation_id == correlation_id)
    }

    /// Records whose message contains `needle`
    pub fn containing(&self, needle: &str) -> Vec<LogRecord> {
        self.find(|r| r.message.contains(needle))
    }
}

impl LogProvider for CapturingLogProvider {
    fn log(&self, record: &LogRecord) {
        self.lock().push(record.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_storage() {
        let capture = CapturingLogProvider::new();
        let logger = capture.logger();
        let id = ActivityId::generate();

        logger.log_args(Severity::Info, "A", &id, "t:1".into(), format_args!("one"));
        logger.log_args(Severity::Error, "B", &ActivityId::ZERO, "t:2".into(), format_args!("two"));

        assert_eq!(capture.count(), 2);
        assert_eq!(capture.for_component("B")[0].message, "two");
        assert_eq!(capture.for_correlation(id).len(), 1);
        assert_eq!(capture.containing("on").len(), 1);

        capture.clear();
        assert_eq!(capture.count(), 0);
    }
}
