//! Operation dispatcher: retries retryable results with back-off
//!
//! [`OperationDispatcher::dispatch`] executes an operation for a context and
//! owns the context's original callback until the operation settles:
//!
//! ```text
//! dispatch(ctx) ──expired?──► finish(Failure EXPIRED)
//!      │
//!      ▼
//!  execute(op, ctx with wrapped callback)
//!      │ sync non-success: ctx was dropped, rebuild it
//!      │ async completion: wrapped callback
//!      ▼
//!  result is Retry ──budget left──► sleep(back-off) ──► dispatch again
//!      │                │
//!      │                └─exhausted──► finish(Failure EXHAUSTED_RETRIES)
//!      ▼
//!  original callback(ctx)
//! ```
//!
//! The original callback is kept in a shared slot rather than inside the
//! context, so it survives an operation that rejects synchronously and drops
//! the context. Whoever takes it from the slot is the only one to call it.
//! Retries are scheduled on the tokio runtime the dispatcher was built with.

use crate::error::{
    self, ResilienceError, SC_DISPATCHER_EXHAUSTED_RETRIES, SC_DISPATCHER_OPERATION_EXPIRED,
};
use crate::retry::RetryStrategy;
use cpio_core_async::errors::SC_ASYNC_CONTEXT_RESULT_NOT_SET;
use cpio_core_async::{AsyncContext, AsyncOperation, Callback, ExecutionResult};
use cpio_observability::{cpio_debug, log_error_context, log_every_n, Logger, Severity};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;

const COMPONENT: &str = "OperationDispatcher";

type CallbackSlot<Req, Resp> = Arc<Mutex<Option<Callback<Req, Resp>>>>;

fn take_callback<Req, Resp>(slot: &CallbackSlot<Req, Resp>) -> Option<Callback<Req, Resp>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

/// Executes operations and re-dispatches retryable results
#[derive(Clone)]
pub struct OperationDispatcher {
    runtime: Handle,
    retry_strategy: RetryStrategy,
    logger: Option<Logger>,
}

impl OperationDispatcher {
    /// Dispatcher scheduling retries on `runtime`
    pub fn new(runtime: Handle, retry_strategy: RetryStrategy) -> Result<Self, ResilienceError> {
        retry_strategy.validate()?;
        error::register_error_codes();

        Ok(Self {
            runtime,
            retry_strategy,
            logger: None,
        })
    }

    /// Dispatcher on the runtime of the calling thread
    pub fn current(retry_strategy: RetryStrategy) -> Result<Self, ResilienceError> {
        let runtime =
            Handle::try_current().map_err(|e| ResilienceError::RuntimeUnavailable(e.to_string()))?;
        Self::new(runtime, retry_strategy)
    }

    /// Log through `logger` instead of the global logger
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn retry_strategy(&self) -> &RetryStrategy {
        &self.retry_strategy
    }

    /// Execute `operation` for `context`, retrying while it reports `Retry`.
    ///
    /// The context's callback is invoked exactly once with the settled
    /// result, from whichever thread settles it.
    pub fn dispatch<Req, Resp, Op>(&self, mut context: AsyncContext<Req, Resp>, operation: Arc<Op>)
    where
        Req: Send + Sync + 'static,
        Resp: Send + Sync + 'static,
        Op: AsyncOperation<Req, Resp> + ?Sized + 'static,
    {
        if context.is_expired() {
            log_error_context!(
                logger = self.logger;
                COMPONENT,
                &context,
                ExecutionResult::failure(SC_DISPATCHER_OPERATION_EXPIRED),
                "operation expired after {} retries",
                context.retry_count
            );
            context.finish_with(ExecutionResult::failure(SC_DISPATCHER_OPERATION_EXPIRED));
            return;
        }

        let slot: CallbackSlot<Req, Resp> = Arc::new(Mutex::new(context.take_callback()));
        context.result = ExecutionResult::failure(SC_ASYNC_CONTEXT_RESULT_NOT_SET);
        context.response = None;

        let request = Arc::clone(&context.request);
        let metadata = context.metadata();

        let dispatcher = self.clone();
        let on_complete_op = Arc::clone(&operation);
        let on_complete_slot = Arc::clone(&slot);
        context.set_callback(move |mut ctx| {
            if let Some(original) = take_callback(&on_complete_slot) {
                ctx.restore_callback(original);
                dispatcher.settle(ctx, on_complete_op);
            }
        });

        let result = operation.execute(context);
        if result.successful() {
            return;
        }

        // rejected synchronously; the operation dropped the context
        let Some(original) = take_callback(&slot) else {
            return;
        };
        let mut context = AsyncContext::from_metadata(metadata, request, original);
        context.result = result;
        self.settle(context, operation);
    }

    /// Hand a settled context (original callback installed) to its caller,
    /// or schedule another attempt when the result is retryable.
    fn settle<Req, Resp, Op>(&self, mut context: AsyncContext<Req, Resp>, operation: Arc<Op>)
    where
        Req: Send + Sync + 'static,
        Resp: Send + Sync + 'static,
        Op: AsyncOperation<Req, Resp> + ?Sized + 'static,
    {
        if !context.result.is_retry() {
            context.finish();
            return;
        }

        if self.retry_strategy.exhausted(context.retry_count) {
            log_error_context!(
                logger = self.logger;
                COMPONENT,
                &context,
                context.result,
                "giving up after {} retries",
                context.retry_count
            );
            context.finish_with(ExecutionResult::failure(SC_DISPATCHER_EXHAUSTED_RETRIES));
            return;
        }

        let delay = self
            .retry_strategy
            .back_off_duration_with_jitter(context.retry_count);
        context.retry_count += 1;

        log_every_n!(
            logger = self.logger;
            Severity::Info,
            100,
            COMPONENT,
            &context,
            "retrying in {:?} (retry {} of {}) after {}",
            delay,
            context.retry_count,
            self.retry_strategy.max_retries,
            context.result
        );

        let dispatcher = self.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            cpio_debug!(
                logger = dispatcher.logger;
                COMPONENT,
                &context,
                "re-dispatching retry {}",
                context.retry_count
            );
            dispatcher.dispatch(context, operation);
        });
    }
}

impl std::fmt::Debug for OperationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationDispatcher")
            .field("retry_strategy", &self.retry_strategy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::BackoffKind;
    use cpio_core_async::errors::SC_UNKNOWN;
    use cpio_core_async::FnOperation;
    use cpio_observability::testing::CapturingLogProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    type Ctx = AsyncContext<u32, u32>;

    fn fast_retries(max_retries: usize) -> RetryStrategy {
        RetryStrategy::new(BackoffKind::Linear, Duration::from_millis(1), max_retries)
    }

    /// Retries synchronously `failures` times, then finishes on a worker task
    fn flaky(failures: usize, attempts: Arc<AtomicUsize>) -> impl AsyncOperation<u32, u32> {
        FnOperation::new(move |ctx: Ctx| {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < failures {
                return ExecutionResult::retry(SC_UNKNOWN);
            }
            let value = *ctx.request + 1;
            tokio::spawn(async move { ctx.finish_with_response(value) });
            ExecutionResult::success()
        })
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let op = Arc::new(flaky(0, Arc::clone(&attempts)));
        let dispatcher = OperationDispatcher::current(fast_retries(3)).unwrap();

        let (ctx, completion) = Ctx::with_completion(Arc::new(41));
        let activity_id = ctx.activity_id();
        dispatcher.dispatch(ctx, op);

        let done = completion.await.unwrap();
        assert!(done.result.successful());
        assert_eq!(done.response.as_deref(), Some(&42));
        assert_eq!(done.activity_id(), activity_id);
        assert_eq!(done.retry_count, 0);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sync_retries_then_success() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let op = Arc::new(flaky(2, Arc::clone(&attempts)));
        let dispatcher = OperationDispatcher::current(fast_retries(5)).unwrap();

        let (ctx, completion) = Ctx::with_completion(Arc::new(1));
        let activity_id = ctx.activity_id();
        dispatcher.dispatch(ctx, op);

        let done = completion.await.unwrap();
        assert!(done.result.successful());
        assert_eq!(done.retry_count, 2);
        assert_eq!(done.activity_id(), activity_id);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_async_retry_results_are_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let op = Arc::new(FnOperation::new(move |ctx: Ctx| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                if attempt == 0 {
                    ctx.finish_with(ExecutionResult::retry(SC_UNKNOWN));
                } else {
                    ctx.finish_with_response(attempt as u32);
                }
            });
            ExecutionResult::success()
        }));
        let dispatcher = OperationDispatcher::current(fast_retries(3)).unwrap();

        let (ctx, completion) = Ctx::with_completion(Arc::new(0));
        dispatcher.dispatch(ctx, op);

        let done = completion.await.unwrap();
        assert!(done.result.successful());
        assert_eq!(done.response.as_deref(), Some(&1));
        assert_eq!(done.retry_count, 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries() {
        let capture = CapturingLogProvider::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let op = Arc::new(flaky(usize::MAX, Arc::clone(&attempts)));
        let dispatcher = OperationDispatcher::current(fast_retries(2))
            .unwrap()
            .with_logger(capture.logger());

        let (ctx, completion) = Ctx::with_completion(Arc::new(0));
        dispatcher.dispatch(ctx, op);

        let done = completion.await.unwrap();
        assert_eq!(
            done.result,
            ExecutionResult::failure(SC_DISPATCHER_EXHAUSTED_RETRIES)
        );
        assert_eq!(done.retry_count, 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(capture.containing("giving up after 2 retries").len(), 1);
    }

    #[tokio::test]
    async fn test_sync_failure_is_terminal() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let op = Arc::new(FnOperation::new(move |_ctx: Ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            ExecutionResult::failure(SC_UNKNOWN)
        }));
        let dispatcher = OperationDispatcher::current(fast_retries(5)).unwrap();

        let (ctx, completion) = Ctx::with_completion(Arc::new(0));
        dispatcher.dispatch(ctx, op);

        let done = completion.await.unwrap();
        assert_eq!(done.result, ExecutionResult::failure(SC_UNKNOWN));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_context_not_executed() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let op = Arc::new(flaky(0, Arc::clone(&attempts)));
        let dispatcher = OperationDispatcher::current(fast_retries(5)).unwrap();

        let (ctx, completion) = Ctx::with_completion(Arc::new(0));
        dispatcher.dispatch(ctx.with_timeout(Duration::ZERO), op);

        let done = completion.await.unwrap();
        assert_eq!(
            done.result,
            ExecutionResult::failure(SC_DISPATCHER_OPERATION_EXPIRED)
        );
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_current_without_runtime() {
        let err = OperationDispatcher::current(RetryStrategy::default()).unwrap_err();
        assert!(matches!(err, ResilienceError::RuntimeUnavailable(_)));
    }

    #[test]
    fn test_invalid_strategy_rejected() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let bad = RetryStrategy::default().with_jitter(2.0);
        assert!(OperationDispatcher::new(runtime.handle().clone(), bad).is_err());
    }
}
