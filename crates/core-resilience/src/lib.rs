//! CPIO Core Resilience: admission control and retry dispatch for async operations
//!
//! # Overview
//!
//! This crate provides decorators that compose around any
//! [`AsyncOperation`](cpio_core_async::AsyncOperation):
//!
//! - **Rate Controller**: caps outstanding operations of one kind and rejects with a retryable result when saturated
//! - **Retry Strategy**: exponential or linear back-off with a retry budget
//! - **Operation Dispatcher**: re-dispatches retryable results after back-off on a tokio runtime
//!
//! # Key Principles
//!
//! Decorators never alter the result or response an operation produces. They
//! observe completion by wrapping the context's callback and always call
//! through to the original.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Caller                          │
//! └─────────────┬───────────────────────────┘
//!               │ dispatch(ctx, op)
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Operation Dispatcher              │  ← Retry with back-off
//! │  (expiry, retry budget, tokio sleep)    │
//! └─────────────┬───────────────────────────┘
//!               │ execute(ctx)
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Rate Controller                   │  ← Admission control
//! │  (outstanding counter, Retry on full)   │
//! └─────────────┬───────────────────────────┘
//!               │ execute(ctx)
//!               ▼
//!         Provider operation
//! ```
//!
//! # Usage Example
//!
//! ```
//! use cpio_core_async::{AsyncContext, ExecutionResult, FnOperation};
//! use cpio_core_resilience::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let provider = FnOperation::new(|ctx: AsyncContext<String, usize>| {
//!     let len = ctx.request.len();
//!     tokio::spawn(async move { ctx.finish_with_response(len) });
//!     ExecutionResult::success()
//! });
//!
//! let controller = Arc::new(
//!     RateController::new("lengths", provider, RateControllerConfig::with_max(16)).unwrap(),
//! );
//! let dispatcher = OperationDispatcher::current(
//!     RetryStrategy::new(BackoffKind::Exponential, Duration::from_millis(10), 3),
//! )
//! .unwrap();
//!
//! let (ctx, completion) = AsyncContext::with_completion(Arc::new("hello".to_string()));
//! dispatcher.dispatch(ctx, controller);
//!
//! let done = completion.await.unwrap();
//! assert_eq!(done.response.as_deref(), Some(&5));
//! # }
//! ```

pub mod dispatcher;
pub mod error;
pub mod rate_controller;
pub mod retry;

// Re-export main types for convenience
pub use dispatcher::OperationDispatcher;
pub use error::{
    register_error_codes, ResilienceError, RESILIENCE_ERROR_CODES, SC_DISPATCHER_EXHAUSTED_RETRIES,
    SC_DISPATCHER_OPERATION_EXPIRED, SC_RATE_CONTROLLER_THROTTLED,
};
pub use rate_controller::{AdmissionMode, RateController, RateControllerConfig, RateControllerState};
pub use retry::{BackoffKind, RetryStrategy};

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use cpio_core_resilience::prelude::*;
/// ```
pub mod prelude {
    pub use super::dispatcher::OperationDispatcher;
    pub use super::error::ResilienceError;
    pub use super::rate_controller::{AdmissionMode, RateController, RateControllerConfig};
    pub use super::retry::{BackoffKind, RetryStrategy};
}
