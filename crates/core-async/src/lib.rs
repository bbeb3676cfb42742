//! CPIO Core Async: execution results and asynchronous operation contexts
//!
//! # Overview
//!
//! This crate defines the vocabulary every CPIO component speaks:
//!
//! - **ExecutionResult**: tri-state outcome (`Success`, `Failure`, `Retry`) with a status code
//! - **ExecutionResultOr**: either a value or a non-successful result
//! - **Status codes**: per-component code namespace with a public error mapping
//! - **ActivityId**: 128-bit identifiers that correlate nested operations
//! - **AsyncContext**: request/response/callback envelope for one asynchronous operation
//! - **AsyncOperation**: the trait providers and decorators implement
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Caller                          │
//! │  AsyncContext::new(request, callback)   │
//! └─────────────┬───────────────────────────┘
//!               │ execute(ctx)
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Decorators (AsyncOperation)       │  ← wrap the callback
//! │  (rate control, retry dispatch)         │
//! └─────────────┬───────────────────────────┘
//!               │ execute(ctx)
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Provider (AsyncOperation)         │  ← does the work
//! │  sets response + result, finish()       │
//! └─────────────┬───────────────────────────┘
//!               │ any thread
//!               ▼
//!         callback(ctx), exactly once
//! ```
//!
//! # Usage Example
//!
//! ```
//! use cpio_core_async::prelude::*;
//! use std::sync::Arc;
//!
//! let op = FnOperation::new(|ctx: AsyncContext<u32, u32>| {
//!     let squared = *ctx.request * *ctx.request;
//!     std::thread::spawn(move || ctx.finish_with_response(squared));
//!     ExecutionResult::success()
//! });
//!
//! let (ctx, completion) = AsyncContext::with_completion(Arc::new(7));
//! assert!(op.execute(ctx).successful());
//!
//! let done = completion.wait().unwrap();
//! assert_eq!(done.response.as_deref(), Some(&49));
//! ```

pub mod activity_id;
pub mod async_context;
pub mod errors;
pub mod execution_result;
pub mod execution_result_or;
pub mod operation;

pub use activity_id::{ActivityId, ParseActivityIdError};
pub use async_context::{AsyncContext, Callback, Completion, ContextMetadata, DEFAULT_EXPIRATION};
pub use errors::{ErrorCodeInfo, PublicErrorCode, StatusCode, SC_OK};
pub use execution_result::{ExecutionResult, ExecutionStatus, InvalidExecutionResult};
pub use execution_result_or::ExecutionResultOr;
pub use operation::{AsyncOperation, FnOperation};

/// Commonly used types
pub mod prelude {
    pub use crate::activity_id::ActivityId;
    pub use crate::async_context::{AsyncContext, Completion};
    pub use crate::errors::{PublicErrorCode, StatusCode};
    pub use crate::execution_result::{ExecutionResult, ExecutionStatus};
    pub use crate::execution_result_or::ExecutionResultOr;
    pub use crate::operation::{AsyncOperation, FnOperation};
}
