//! Request/response/callback envelope for one asynchronous operation
//!
//! An [`AsyncContext`] is created by the initiator of an operation and moved
//! through every layer that handles it. Whoever finishes the operation sets
//! `result` (and `response` on success) and calls [`AsyncContext::finish`],
//! which hands the context to its callback exactly once. Because `finish`
//! consumes the context, a second invocation is unrepresentable.
//!
//! ```text
//!  caller ──new(request, cb)──► decorator ──wrap cb──► provider
//!                                                         │ worker thread
//!  cb(ctx) ◄── original cb ◄── wrapper(ctx) ◄── finish() ─┘
//! ```
//!
//! Decorators observe completion by replacing the callback with a closure
//! that owns the original and calls through to it. A wrapper must always
//! call the original, otherwise the initiator never hears back.

use crate::activity_id::ActivityId;
use crate::errors::{SC_ASYNC_CONTEXT_DROPPED, SC_ASYNC_CONTEXT_RESULT_NOT_SET};
use crate::execution_result::ExecutionResult;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Completion callback; receives the finished context by value
pub type Callback<Req, Resp> = Box<dyn FnOnce(AsyncContext<Req, Resp>) + Send + 'static>;

/// Lifetime of a context before dispatchers stop retrying it
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(90);

/// Correlation and retry bookkeeping carried by a context
///
/// Dispatchers use it to rebuild a context for a new attempt when an
/// operation rejected (and dropped) the previous one synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextMetadata {
    pub activity_id: ActivityId,
    pub parent_activity_id: Option<ActivityId>,
    pub correlation_id: ActivityId,
    pub retry_count: usize,
    pub expiration_time: Instant,
}

/// Envelope for one asynchronous operation
///
/// # Example
///
/// ```
/// use cpio_core_async::{AsyncContext, ExecutionResult};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// let called = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&called);
///
/// let mut ctx: AsyncContext<String, usize> =
///     AsyncContext::new(Arc::new("hello".to_string()), move |ctx| {
///         assert!(ctx.result.successful());
///         assert_eq!(ctx.response.as_deref(), Some(&5));
///         flag.store(true, Ordering::SeqCst);
///     });
///
/// // provider side
/// ctx.response = Some(Arc::new(ctx.request.len()));
/// ctx.finish_with(ExecutionResult::success());
///
/// assert!(called.load(Ordering::SeqCst));
/// ```
pub struct AsyncContext<Req, Resp> {
    pub request: Arc<Req>,
    /// Populated by the operation before it finishes successfully
    pub response: Option<Arc<Resp>>,
    /// Outcome of the operation; `Failure(SC_ASYNC_CONTEXT_RESULT_NOT_SET)` until set
    pub result: ExecutionResult,
    /// Number of retries already attempted for this context
    pub retry_count: usize,
    /// Point after which dispatchers stop retrying
    pub expiration_time: Instant,
    callback: Option<Callback<Req, Resp>>,
    activity_id: ActivityId,
    parent_activity_id: Option<ActivityId>,
    correlation_id: ActivityId,
}

impl<Req, Resp> AsyncContext<Req, Resp> {
    /// Create a root context with a fresh activity id.
    ///
    /// A root context's correlation id is its own activity id.
    pub fn new<F>(request: Arc<Req>, callback: F) -> Self
    where
        F: FnOnce(AsyncContext<Req, Resp>) + Send + 'static,
    {
        let activity_id = ActivityId::generate();
        Self {
            request,
            response: None,
            result: ExecutionResult::failure(SC_ASYNC_CONTEXT_RESULT_NOT_SET),
            retry_count: 0,
            expiration_time: Instant::now() + DEFAULT_EXPIRATION,
            callback: Some(Box::new(callback)),
            activity_id,
            parent_activity_id: None,
            correlation_id: activity_id,
        }
    }

    /// Create a child context of `parent`.
    ///
    /// The child gets a fresh activity id, records the parent's activity id as
    /// its `parent_activity_id` and shares the parent's correlation id. The
    /// parent's request and response types may differ from the child's.
    pub fn from_parent<PReq, PResp, F>(
        parent: &AsyncContext<PReq, PResp>,
        request: Arc<Req>,
        callback: F,
    ) -> Self
    where
        F: FnOnce(AsyncContext<Req, Resp>) + Send + 'static,
    {
        let mut child = Self::new(request, callback);
        child.parent_activity_id = Some(parent.activity_id);
        child.correlation_id = parent.correlation_id;
        child
    }

    /// Rebuild a context for a new attempt of the operation described by
    /// `metadata`, keeping its ids, retry count and expiration.
    pub fn from_metadata(
        metadata: ContextMetadata,
        request: Arc<Req>,
        callback: Callback<Req, Resp>,
    ) -> Self {
        Self {
            request,
            response: None,
            result: ExecutionResult::failure(SC_ASYNC_CONTEXT_RESULT_NOT_SET),
            retry_count: metadata.retry_count,
            expiration_time: metadata.expiration_time,
            callback: Some(callback),
            activity_id: metadata.activity_id,
            parent_activity_id: metadata.parent_activity_id,
            correlation_id: metadata.correlation_id,
        }
    }

    pub fn activity_id(&self) -> ActivityId {
        self.activity_id
    }

    pub fn parent_activity_id(&self) -> Option<ActivityId> {
        self.parent_activity_id
    }

    pub fn correlation_id(&self) -> ActivityId {
        self.correlation_id
    }

    pub fn metadata(&self) -> ContextMetadata {
        ContextMetadata {
            activity_id: self.activity_id,
            parent_activity_id: self.parent_activity_id,
            correlation_id: self.correlation_id,
            retry_count: self.retry_count,
            expiration_time: self.expiration_time,
        }
    }

    /// Override the expiration time
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.expiration_time = Instant::now() + timeout;
        self
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expiration_time
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Remove the callback so a decorator can wrap it
    pub fn take_callback(&mut self) -> Option<Callback<Req, Resp>> {
        self.callback.take()
    }

    /// Install a callback, replacing any existing one
    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: FnOnce(AsyncContext<Req, Resp>) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    /// Install an already boxed callback, e.g. one taken with [`take_callback`](Self::take_callback)
    pub fn restore_callback(&mut self, callback: Callback<Req, Resp>) {
        self.callback = Some(callback);
    }

    /// Complete the operation: hand the context to its callback.
    ///
    /// `result` must be set before calling this. A context without a callback
    /// is simply dropped.
    pub fn finish(mut self) {
        if let Some(callback) = self.callback.take() {
            callback(self);
        }
    }

    /// Set `result` and finish
    pub fn finish_with(mut self, result: ExecutionResult) {
        self.result = result;
        self.finish();
    }

    /// Set `response`, mark the result successful and finish
    pub fn finish_with_response(mut self, response: Resp) {
        self.response = Some(Arc::new(response));
        self.result = ExecutionResult::success();
        self.finish();
    }
}

impl<Req, Resp> AsyncContext<Req, Resp>
where
    Req: Send + Sync + 'static,
    Resp: Send + Sync + 'static,
{
    /// Create a root context whose finish is delivered to the returned [`Completion`]
    pub fn with_completion(request: Arc<Req>) -> (Self, Completion<Req, Resp>) {
        let (sender, receiver) = oneshot::channel();
        let context = Self::new(request, move |ctx| {
            // receiver gone means the caller lost interest
            let _ = sender.send(ctx);
        });
        (context, Completion { receiver })
    }

    /// Like [`with_completion`](Self::with_completion) for a child of `parent`
    pub fn with_completion_from_parent<PReq, PResp>(
        parent: &AsyncContext<PReq, PResp>,
        request: Arc<Req>,
    ) -> (Self, Completion<Req, Resp>) {
        let (sender, receiver) = oneshot::channel();
        let context = Self::from_parent(parent, request, move |ctx| {
            let _ = sender.send(ctx);
        });
        (context, Completion { receiver })
    }
}

impl<Req: fmt::Debug, Resp: fmt::Debug> fmt::Debug for AsyncContext<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncContext")
            .field("request", &self.request)
            .field("response", &self.response)
            .field("result", &self.result)
            .field("activity_id", &self.activity_id)
            .field("parent_activity_id", &self.parent_activity_id)
            .field("correlation_id", &self.correlation_id)
            .field("retry_count", &self.retry_count)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

/// Receiving end of a context created with [`AsyncContext::with_completion`]
///
/// Resolves to the finished context, or to
/// `Failure(SC_ASYNC_CONTEXT_DROPPED)` if the context was dropped without
/// being finished (for example after a synchronous rejection).
pub struct Completion<Req, Resp> {
    receiver: oneshot::Receiver<AsyncContext<Req, Resp>>,
}

impl<Req, Resp> Completion<Req, Resp> {
    /// Block the current thread until the context finishes.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context;
    /// await the completion instead.
    pub fn wait(self) -> Result<AsyncContext<Req, Resp>, ExecutionResult> {
        self.receiver
            .blocking_recv()
            .map_err(|_| ExecutionResult::failure(SC_ASYNC_CONTEXT_DROPPED))
    }

    /// Non-blocking check; `Ok(None)` while the operation is still running
    pub fn try_wait(&mut self) -> Result<Option<AsyncContext<Req, Resp>>, ExecutionResult> {
        match self.receiver.try_recv() {
            Ok(ctx) => Ok(Some(ctx)),
            Err(oneshot::error::TryRecvError::Empty) => Ok(None),
            Err(oneshot::error::TryRecvError::Closed) => {
                Err(ExecutionResult::failure(SC_ASYNC_CONTEXT_DROPPED))
            }
        }
    }
}

impl<Req, Resp> Future for Completion<Req, Resp> {
    type Output = Result<AsyncContext<Req, Resp>, ExecutionResult>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.map_err(|_| ExecutionResult::failure(SC_ASYNC_CONTEXT_DROPPED)))
    }
}
