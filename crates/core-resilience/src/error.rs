//! Error types and status codes for the resilience layer
//!
//! Setup problems (bad configuration, no runtime) are reported as
//! [`ResilienceError`]. Outcomes of individual operations are
//! `ExecutionResult`s carrying the status codes declared here.

use cpio_core_async::define_error_codes;
use thiserror::Error;

/// Component id of the resilience layer in the status-code namespace
pub const RESILIENCE_COMPONENT: u16 = 0x0002;

define_error_codes! {
    /// Status codes produced by rate controllers and dispatchers
    pub table RESILIENCE_ERROR_CODES, component = RESILIENCE_COMPONENT;
    /// Too many operations outstanding; resubmit later
    SC_RATE_CONTROLLER_THROTTLED = 0x0001,
        "Operation throttled: too many outstanding operations", ResourceExhausted;
    SC_DISPATCHER_OPERATION_EXPIRED = 0x0002,
        "Operation expired before it could complete", DeadlineExceeded;
    SC_DISPATCHER_EXHAUSTED_RETRIES = 0x0003,
        "Operation still retryable after the maximum number of retries", Unavailable;
}

/// Add this crate's status codes to the process-wide registry
pub fn register_error_codes() {
    cpio_core_async::errors::register_error_codes(RESILIENCE_ERROR_CODES);
}

/// Errors that can occur while building resilience components
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResilienceError {
    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No tokio runtime to schedule retries on
    #[error("No tokio runtime available: {0}")]
    RuntimeUnavailable(String),
}
