//! CPIO Observability: correlated, throttled structured logging
//!
//! This crate provides the logging layer used along hot asynchronous paths:
//! - **Correlation**: every record carries correlation, parent and activity ids
//!   taken from an `ActivityId` or an `AsyncContext`
//! - **Pluggable sinks**: `LogProvider` implementations behind a cheap `Logger` handle
//! - **Throttling**: per-call-site `log_every_period!` and `log_every_n!`
//! - **Global fallback**: an explicitly initialized process-wide logger
//!
//! ## Architecture
//!
//! ```text
//!  cpio_info!(logger = l; component, &ctx, "...")
//!          │
//!          ▼
//!   throttle (static atomic per call site)  ── skip ──► nothing
//!          │ emit
//!          ▼
//!   Logger (injected) ──or──► global::logger()
//!          │
//!          ▼
//!   LogProvider: TracingLogProvider │ JsonLinesLogProvider │ CapturingLogProvider
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use cpio_observability::{global, log_every_period, cpio_warning, Logger, Severity};
//! use cpio_core_async::ActivityId;
//! use std::time::Duration;
//!
//! global::init(Logger::tracing()).unwrap();
//!
//! let id = ActivityId::generate();
//! cpio_warning!("Quickstart", id, "queue depth {}", 42);
//! for _ in 0..1000 {
//!     log_every_period!(Severity::Info, Duration::from_secs(1), "Quickstart", id, "hot loop");
//! }
//!
//! global::shutdown();
//! ```

pub mod correlation;
pub mod global;
pub mod logger;
mod macros;
pub mod record;
pub mod severity;
pub mod testing;
pub mod throttle;

pub use correlation::LogCorrelation;
pub use global::GlobalLoggerError;
pub use logger::{JsonLinesLogProvider, LogProvider, Logger, LoggerError, TracingLogProvider};
pub use record::LogRecord;
pub use severity::{ParseSeverityError, Severity};
pub use throttle::{EveryN, EveryPeriod};

#[doc(hidden)]
pub mod __private {
    pub use crate::logger::{emit, MaybeLogger};
    pub use cpio_core_async as core;
}
