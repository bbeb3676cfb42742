//! Tri-state execution result
//!
//! An [`ExecutionResult`] is the outcome of one attempt at an operation:
//!
//! - **Success**: the operation completed; `status_code` is always `SC_OK`
//! - **Failure**: terminal for this attempt
//! - **Retry**: transient condition (throttling, unavailable backend); the
//!   same logical operation may be resubmitted
//!
//! The invariant `status_code == SC_OK` iff `status == Success` holds for every
//! value of the type, including values read back from the serialized form.

use crate::errors::{self, StatusCode, SC_OK, SC_UNKNOWN};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome class of an execution result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Success,
    Failure,
    Retry,
}

/// Error returned when a status/code pair violates the result invariant
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid execution result: {status:?} with status code {status_code:#x}")]
pub struct InvalidExecutionResult {
    pub status: ExecutionStatus,
    pub status_code: StatusCode,
}

/// Result of one attempt at an operation
///
/// # Example
///
/// ```
/// use cpio_core_async::{ExecutionResult, ExecutionStatus};
/// use cpio_core_async::errors::SC_UNKNOWN;
///
/// let ok = ExecutionResult::success();
/// assert!(ok.successful());
///
/// let retry = ExecutionResult::retry(SC_UNKNOWN);
/// assert_eq!(retry.status(), ExecutionStatus::Retry);
/// assert_eq!(retry.status_code(), SC_UNKNOWN);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "WireExecutionResult", into = "WireExecutionResult")]
pub struct ExecutionResult {
    status: ExecutionStatus,
    status_code: StatusCode,
}

impl ExecutionResult {
    /// A successful result
    pub const fn success() -> Self {
        Self {
            status: ExecutionStatus::Success,
            status_code: SC_OK,
        }
    }

    /// A terminal failure with the given status code.
    ///
    /// A zero code is not a valid failure; it is replaced by `SC_UNKNOWN`.
    pub fn failure(status_code: StatusCode) -> Self {
        Self::non_success(ExecutionStatus::Failure, status_code)
    }

    /// A retryable failure with the given status code.
    ///
    /// A zero code is not a valid retry; it is replaced by `SC_UNKNOWN`.
    pub fn retry(status_code: StatusCode) -> Self {
        Self::non_success(ExecutionStatus::Retry, status_code)
    }

    fn non_success(status: ExecutionStatus, status_code: StatusCode) -> Self {
        debug_assert_ne!(status_code, SC_OK, "{status:?} result requires a nonzero code");
        let status_code = if status_code == SC_OK {
            SC_UNKNOWN
        } else {
            status_code
        };
        Self {
            status,
            status_code,
        }
    }

    /// Build a result from a raw status/code pair, validating the invariant
    pub fn new(
        status: ExecutionStatus,
        status_code: StatusCode,
    ) -> Result<Self, InvalidExecutionResult> {
        let valid = match status {
            ExecutionStatus::Success => status_code == SC_OK,
            ExecutionStatus::Failure | ExecutionStatus::Retry => status_code != SC_OK,
        };
        if valid {
            Ok(Self {
                status,
                status_code,
            })
        } else {
            Err(InvalidExecutionResult {
                status,
                status_code,
            })
        }
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    /// True iff the status is `Success`
    pub fn successful(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    pub fn is_failure(&self) -> bool {
        self.status == ExecutionStatus::Failure
    }

    pub fn is_retry(&self) -> bool {
        self.status == ExecutionStatus::Retry
    }

    /// Registered message for this result's status code
    pub fn message(&self) -> &'static str {
        errors::error_message(self.status_code)
    }

    /// Convert into a `Result` so callers can use `?`
    pub fn into_result(self) -> Result<(), ExecutionResult> {
        if self.successful() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl Default for ExecutionResult {
    fn default() -> Self {
        Self::success()
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            ExecutionStatus::Success => f.write_str("Success"),
            status => write!(
                f,
                "{:?} ({:#010x}: {})",
                status,
                self.status_code,
                self.message()
            ),
        }
    }
}

impl std::error::Error for ExecutionResult {}

/// Serialized form: `{ "status": "Retry", "status_code": 131073 }`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct WireExecutionResult {
    status: ExecutionStatus,
    #[serde(default)]
    status_code: StatusCode,
}

impl TryFrom<WireExecutionResult> for ExecutionResult {
    type Error = InvalidExecutionResult;

    fn try_from(wire: WireExecutionResult) -> Result<Self, Self::Error> {
        ExecutionResult::new(wire.status, wire.status_code)
    }
}

impl From<ExecutionResult> for WireExecutionResult {
    fn from(result: ExecutionResult) -> Self {
        Self {
            status: result.status,
            status_code: result.status_code,
        }
    }
}

/// Return the given result from the enclosing function unless it is successful.
///
/// The enclosing function may return `ExecutionResult` or any type that
/// implements `From<ExecutionResult>`, such as `ExecutionResultOr<T>`.
#[macro_export]
macro_rules! return_if_failure {
    ($result:expr) => {{
        let __result: $crate::ExecutionResult = $result;
        if !__result.successful() {
            return ::core::convert::From::from(__result);
        }
    }};
}
