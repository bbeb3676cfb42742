//! Status-code namespace and public error mapping
//!
//! Every non-successful [`ExecutionResult`](crate::ExecutionResult) carries an
//! opaque `u64` status code. Codes are partitioned per component:
//!
//! ```text
//!  63            32 31        16 15         0
//! ┌────────────────┬────────────┬────────────┐
//! │    reserved    │ component  │   offset   │
//! └────────────────┴────────────┴────────────┘
//! ```
//!
//! Each component declares its codes once with [`define_error_codes!`], which
//! produces the constants plus a static table of [`ErrorCodeInfo`]. Tables are
//! added to the process-wide registry with [`register_error_codes`] so that
//! messages and public codes can be resolved at the public boundary.
//!
//! # Example
//!
//! ```
//! use cpio_core_async::define_error_codes;
//! use cpio_core_async::errors::{
//!     error_message, map_to_public_error_code, register_error_codes, PublicErrorCode,
//! };
//!
//! define_error_codes! {
//!     pub table QUEUE_ERROR_CODES, component = 0x0201;
//!     SC_QUEUE_EMPTY = 0x0001, "Queue has no messages", NotFound;
//! }
//!
//! register_error_codes(QUEUE_ERROR_CODES);
//! assert_eq!(error_message(SC_QUEUE_EMPTY), "Queue has no messages");
//! assert_eq!(map_to_public_error_code(SC_QUEUE_EMPTY), PublicErrorCode::NotFound);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{PoisonError, RwLock};

/// Opaque status code attached to every execution result
pub type StatusCode = u64;

/// Status code of every successful result
pub const SC_OK: StatusCode = 0;

/// Component id reserved for this crate
pub const CORE_ASYNC_COMPONENT: u16 = 0x0001;

/// Build a status code from a component id and an offset within it
pub const fn make_status_code(component: u16, offset: u16) -> StatusCode {
    ((component as u64) << 16) | offset as u64
}

/// Extract the component id of a status code
pub const fn component_of(code: StatusCode) -> u16 {
    ((code >> 16) & 0xFFFF) as u16
}

/// Extract the per-component offset of a status code
pub const fn offset_of(code: StatusCode) -> u16 {
    (code & 0xFFFF) as u16
}

/// Public-facing error taxonomy that internal status codes are mapped onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicErrorCode {
    Ok,
    Unknown,
    InvalidArgument,
    NotFound,
    AlreadyExists,
    /// Quota or concurrency limit reached; the caller may resubmit later
    ResourceExhausted,
    Unavailable,
    DeadlineExceeded,
    Internal,
}

impl fmt::Display for PublicErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PublicErrorCode::Ok => "OK",
            PublicErrorCode::Unknown => "UNKNOWN",
            PublicErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            PublicErrorCode::NotFound => "NOT_FOUND",
            PublicErrorCode::AlreadyExists => "ALREADY_EXISTS",
            PublicErrorCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            PublicErrorCode::Unavailable => "UNAVAILABLE",
            PublicErrorCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            PublicErrorCode::Internal => "INTERNAL",
        };
        f.write_str(name)
    }
}

/// Registration record for a single status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCodeInfo {
    pub code: StatusCode,
    pub name: &'static str,
    pub message: &'static str,
    pub public_code: PublicErrorCode,
}

/// Declare a component's status codes and its registration table.
///
/// Each entry is `NAME = offset, "message", PublicErrorCodeVariant;`.
#[macro_export]
macro_rules! define_error_codes {
    (
        $(#[$table_meta:meta])*
        $vis:vis table $table:ident, component = $component:expr;
        $(
            $(#[$meta:meta])*
            $name:ident = $offset:expr, $message:expr, $public:ident;
        )*
    ) => {
        $(
            $(#[$meta])*
            $vis const $name: $crate::errors::StatusCode =
                $crate::errors::make_status_code($component, $offset);
        )*

        $(#[$table_meta])*
        $vis static $table: &[$crate::errors::ErrorCodeInfo] = &[
            $(
                $crate::errors::ErrorCodeInfo {
                    code: $name,
                    name: stringify!($name),
                    message: $message,
                    public_code: $crate::errors::PublicErrorCode::$public,
                },
            )*
        ];
    };
}

define_error_codes! {
    /// Status codes owned by the async execution core
    pub table CORE_ASYNC_ERROR_CODES, component = CORE_ASYNC_COMPONENT;
    SC_UNKNOWN = 0x0001, "Unknown error", Unknown;
    SC_EXECUTION_RESULT_OR_MISSING_VALUE = 0x0002,
        "ExecutionResultOr was built from a successful result without a value", Internal;
    SC_ASYNC_CONTEXT_RESULT_NOT_SET = 0x0003,
        "Async context was finished without setting a result", Internal;
    SC_ASYNC_CONTEXT_DROPPED = 0x0004,
        "Async context was dropped before its callback ran", Internal;
    SC_ASYNC_CONTEXT_MISSING_RESPONSE = 0x0005,
        "Async context finished successfully without a response", Internal;
}

static REGISTRY: RwLock<Vec<&'static [ErrorCodeInfo]>> = RwLock::new(Vec::new());

/// Add a component's code table to the process-wide registry.
///
/// Registering the same table twice is a no-op.
pub fn register_error_codes(table: &'static [ErrorCodeInfo]) {
    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    if !registry.iter().any(|t| std::ptr::eq(*t, table)) {
        registry.push(table);
    }
}

/// Look up the registration record of a status code
pub fn lookup(code: StatusCode) -> Option<&'static ErrorCodeInfo> {
    if let Some(info) = CORE_ASYNC_ERROR_CODES.iter().find(|i| i.code == code) {
        return Some(info);
    }

    let registry = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    registry
        .iter()
        .flat_map(|table| table.iter())
        .find(|info| info.code == code)
}

/// Human-readable message for a status code
pub fn error_message(code: StatusCode) -> &'static str {
    if code == SC_OK {
        return "Success";
    }
    lookup(code).map_or("Unknown error", |info| info.message)
}

/// Map an internal status code onto the public error taxonomy
pub fn map_to_public_error_code(code: StatusCode) -> PublicErrorCode {
    if code == SC_OK {
        return PublicErrorCode::Ok;
    }
    lookup(code).map_or(PublicErrorCode::Unknown, |info| info.public_code)
}
