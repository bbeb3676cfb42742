//! Structured log record

use crate::correlation::LogCorrelation;
use crate::severity::Severity;
use chrono::{DateTime, Utc};
use cpio_core_async::ActivityId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One log statement, as handed to a [`LogProvider`](crate::LogProvider)
///
/// Serialized as a single JSON object per line by
/// [`JsonLinesLogProvider`](crate::JsonLinesLogProvider).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    /// Component that produced the record, e.g. `"RateController"`
    pub component: String,
    pub correlation_id: ActivityId,
    pub parent_activity_id: ActivityId,
    pub activity_id: ActivityId,
    /// `file:line` of the log statement
    pub location: String,
    pub message: String,
}

impl LogRecord {
    pub fn new<C: LogCorrelation + ?Sized>(
        severity: Severity,
        component: &str,
        correlation: &C,
        location: String,
        message: String,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            severity,
            component: component.to_string(),
            correlation_id: correlation.correlation_id(),
            parent_activity_id: correlation.parent_activity_id(),
            activity_id: correlation.activity_id(),
            location,
            message,
        }
    }
}

/// `|component|correlation|parent|activity| location: message`
impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "|{}|{}|{}|{}| {}: {}",
            self.component,
            self.correlation_id,
            self.parent_activity_id,
            self.activity_id,
            self.location,
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_layout() {
        let id = ActivityId::from_parts(1, 2);
        let record = LogRecord::new(
            Severity::Info,
            "Parameter",
            &id,
            "src/parameter.rs:10".to_string(),
            "fetched".to_string(),
        );
        assert_eq!(
            record.to_string(),
            format!(
                "|Parameter|{id}|{}|{id}| src/parameter.rs:10: fetched",
                ActivityId::ZERO
            )
        );
    }

    #[test]
    fn test_json_line() {
        let record = LogRecord::new(
            Severity::Critical,
            "Dispatcher",
            &ActivityId::ZERO,
            "here:1".to_string(),
            "boom".to_string(),
        );
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""severity":"critical""#));
        let back: LogRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
