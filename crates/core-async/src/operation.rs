//! Operation abstraction shared by providers and decorators

use crate::async_context::AsyncContext;
use crate::execution_result::ExecutionResult;
use std::sync::Arc;

/// An operation that completes an [`AsyncContext`] asynchronously
///
/// `execute` reports only whether the operation was *scheduled*:
///
/// - `Success`: the operation owns the context and will finish it exactly
///   once, possibly on another thread and possibly before `execute` returns
/// - anything else: the operation rejected the context synchronously and
///   dropped it without invoking its callback
///
/// Decorators such as rate controllers implement this trait and forward to an
/// inner operation, so layers compose without either side knowing the other.
pub trait AsyncOperation<Req, Resp>: Send + Sync {
    fn execute(&self, context: AsyncContext<Req, Resp>) -> ExecutionResult;
}

impl<Req, Resp, T> AsyncOperation<Req, Resp> for Arc<T>
where
    T: AsyncOperation<Req, Resp> + ?Sized,
{
    fn execute(&self, context: AsyncContext<Req, Resp>) -> ExecutionResult {
        (**self).execute(context)
    }
}

impl<Req, Resp, T> AsyncOperation<Req, Resp> for Box<T>
where
    T: AsyncOperation<Req, Resp> + ?Sized,
{
    fn execute(&self, context: AsyncContext<Req, Resp>) -> ExecutionResult {
        (**self).execute(context)
    }
}

/// Adapter that turns a closure into an [`AsyncOperation`]
///
/// ```
/// use cpio_core_async::{AsyncContext, AsyncOperation, ExecutionResult, FnOperation};
/// use std::sync::Arc;
///
/// let echo = FnOperation::new(|ctx: AsyncContext<String, String>| {
///     let reply = ctx.request.to_string();
///     ctx.finish_with_response(reply);
///     ExecutionResult::success()
/// });
///
/// let (ctx, completion) = AsyncContext::with_completion(Arc::new("hi".to_string()));
/// assert!(echo.execute(ctx).successful());
/// let done = completion.wait().unwrap();
/// assert_eq!(done.response.as_deref().map(String::as_str), Some("hi"));
/// ```
pub struct FnOperation<F> {
    func: F,
}

impl<F> FnOperation<F> {
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<Req, Resp, F> AsyncOperation<Req, Resp> for FnOperation<F>
where
    F: Fn(AsyncContext<Req, Resp>) -> ExecutionResult + Send + Sync,
{
    fn execute(&self, context: AsyncContext<Req, Resp>) -> ExecutionResult {
        (self.func)(context)
    }
}
