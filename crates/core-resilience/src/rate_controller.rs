//! Rate controller: admission control for one kind of async operation
//!
//! A [`RateController`] wraps an [`AsyncOperation`] and caps how many of its
//! operations are outstanding at once. There is no queue:
//!
//! - **Saturated**: `submit` returns `Retry(SC_RATE_CONTROLLER_THROTTLED)`
//!   immediately and drops the context. Its callback is never invoked, so the
//!   synchronous return is the caller's only signal.
//! - **Admitted**: the counter is incremented, the context's callback is
//!   wrapped so the counter is decremented after the original callback ran,
//!   and the context is forwarded. The inner operation's synchronous return
//!   value is passed back unchanged.
//!
//! The controller never touches `result` or `response`.
//!
//! # Admission modes
//!
//! [`AdmissionMode::BestEffort`] checks then increments. Racing submitters
//! that all pass the check before any increments may overshoot the ceiling
//! by the number of racers. [`AdmissionMode::Strict`] uses a single
//! compare-and-swap loop and never overshoots.
//!
//! # Example
//!
//! ```
//! use cpio_core_async::{AsyncContext, ExecutionResult, FnOperation};
//! use cpio_core_resilience::rate_controller::{RateController, RateControllerConfig};
//! use std::sync::{Arc, Mutex};
//!
//! // an operation that parks contexts instead of finishing them
//! let parked = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&parked);
//! let op = FnOperation::new(move |ctx: AsyncContext<u32, u32>| {
//!     sink.lock().unwrap().push(ctx);
//!     ExecutionResult::success()
//! });
//!
//! let controller = RateController::new("example", op, RateControllerConfig::with_max(1)).unwrap();
//!
//! assert!(controller.submit(AsyncContext::new(Arc::new(1), |_| {})).successful());
//! assert!(controller.submit(AsyncContext::new(Arc::new(2), |_| {})).is_retry());
//!
//! // finishing the parked context frees the slot
//! let ctx = parked.lock().unwrap().pop().unwrap();
//! ctx.finish_with_response(10);
//! assert_eq!(controller.outstanding(), 0);
//! ```

use crate::error::{self, ResilienceError, SC_RATE_CONTROLLER_THROTTLED};
use cpio_core_async::{AsyncContext, AsyncOperation, ExecutionResult};
use cpio_observability::{log_every_n, log_every_period, Logger, Severity};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const COMPONENT: &str = "RateController";

const THROTTLE_LOG_PERIOD: Duration = Duration::from_secs(5);

/// How the outstanding ceiling is enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionMode {
    /// Check, then increment; may overshoot under concurrent submits
    #[default]
    BestEffort,

    /// Compare-and-swap increment; never exceeds the ceiling
    Strict,
}

/// Configuration for a rate controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateControllerConfig {
    /// Maximum number of operations outstanding at once
    pub max_outstanding: usize,

    pub admission: AdmissionMode,
}

impl Default for RateControllerConfig {
    fn default() -> Self {
        Self {
            max_outstanding: 1_000,
            admission: AdmissionMode::BestEffort,
        }
    }
}

impl RateControllerConfig {
    pub fn with_max(max_outstanding: usize) -> Self {
        Self {
            max_outstanding,
            ..Default::default()
        }
    }

    pub fn strict(mut self) -> Self {
        self.admission = AdmissionMode::Strict;
        self
    }

    pub fn validate(&self) -> Result<(), ResilienceError> {
        if self.max_outstanding == 0 {
            return Err(ResilienceError::InvalidConfig(
                "max_outstanding must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Snapshot of a rate controller's counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateControllerState {
    pub outstanding: usize,
    pub max_outstanding: usize,
    pub admitted_total: u64,
    pub throttled_total: u64,

    /// Whether new submits are currently rejected
    pub is_saturated: bool,

    /// Outstanding as a fraction of the ceiling (may exceed 1.0 in best-effort mode)
    pub utilization: f64,
}

#[derive(Debug, Default)]
struct Counters {
    outstanding: AtomicUsize,
    admitted_total: AtomicU64,
    throttled_total: AtomicU64,
}

/// Releases one outstanding slot when dropped
///
/// Travels inside the wrapped callback, so the slot is released after the
/// original callback ran, or when the context is dropped unfinished.
struct AdmissionPermit {
    counters: Arc<Counters>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        let _ = self
            .counters
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                Some(v.saturating_sub(1))
            });
    }
}

/// Admission-control decorator around an [`AsyncOperation`]
pub struct RateController<Op> {
    name: String,
    config: RateControllerConfig,
    counters: Arc<Counters>,
    inner: Op,
    logger: Option<Logger>,
}

impl<Op> RateController<Op> {
    /// Create a controller for operations of kind `name`
    pub fn new(
        name: impl Into<String>,
        inner: Op,
        config: RateControllerConfig,
    ) -> Result<Self, ResilienceError> {
        config.validate()?;
        error::register_error_codes();

        Ok(Self {
            name: name.into(),
            config,
            counters: Arc::new(Counters::default()),
            inner,
            logger: None,
        })
    }

    /// Log through `logger` instead of the global logger
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &RateControllerConfig {
        &self.config
    }

    pub fn inner(&self) -> &Op {
        &self.inner
    }

    pub fn outstanding(&self) -> usize {
        self.counters.outstanding.load(Ordering::Acquire)
    }

    pub fn max_outstanding(&self) -> usize {
        self.config.max_outstanding
    }

    /// Whether a submit right now would be admitted
    pub fn can_admit(&self) -> bool {
        self.outstanding() < self.config.max_outstanding
    }

    pub fn state(&self) -> RateControllerState {
        let outstanding = self.outstanding();
        RateControllerState {
            outstanding,
            max_outstanding: self.config.max_outstanding,
            admitted_total: self.counters.admitted_total.load(Ordering::Relaxed),
            throttled_total: self.counters.throttled_total.load(Ordering::Relaxed),
            is_saturated: outstanding >= self.config.max_outstanding,
            utilization: outstanding as f64 / self.config.max_outstanding as f64,
        }
    }

    fn try_admit(&self) -> bool {
        let max = self.config.max_outstanding;
        match self.config.admission {
            AdmissionMode::BestEffort => {
                if self.counters.outstanding.load(Ordering::Acquire) >= max {
                    return false;
                }
                self.counters.outstanding.fetch_add(1, Ordering::AcqRel);
                true
            }
            AdmissionMode::Strict => self
                .counters
                .outstanding
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                    (v < max).then_some(v + 1)
                })
                .is_ok(),
        }
    }

    /// Admit and forward `context`, or reject it with a retryable result
    pub fn submit<Req, Resp>(&self, mut context: AsyncContext<Req, Resp>) -> ExecutionResult
    where
        Op: AsyncOperation<Req, Resp>,
        Req: 'static,
        Resp: 'static,
    {
        if !self.try_admit() {
            let throttled = self.counters.throttled_total.fetch_add(1, Ordering::Relaxed) + 1;
            log_every_period!(
                logger = self.logger;
                Severity::Warning,
                THROTTLE_LOG_PERIOD,
                COMPONENT,
                &context,
                "{}: throttled with {} of {} operations outstanding ({} throttled so far)",
                self.name,
                self.outstanding(),
                self.config.max_outstanding,
                throttled
            );
            return ExecutionResult::retry(SC_RATE_CONTROLLER_THROTTLED);
        }

        let admitted = self.counters.admitted_total.fetch_add(1, Ordering::Relaxed);
        log_every_n!(
            logger = self.logger;
            Severity::Debug,
            1_000,
            COMPONENT,
            &context,
            "{}: admitted operation #{} ({} outstanding)",
            self.name,
            admitted + 1,
            self.outstanding()
        );

        let permit = AdmissionPermit {
            counters: Arc::clone(&self.counters),
        };
        let original = context.take_callback();
        context.set_callback(move |ctx| {
            let _permit = permit;
            if let Some(original) = original {
                original(ctx);
            }
        });

        self.inner.execute(context)
    }
}

impl<Req, Resp, Op> AsyncOperation<Req, Resp> for RateController<Op>
where
    Op: AsyncOperation<Req, Resp>,
    Req: 'static,
    Resp: 'static,
{
    fn execute(&self, context: AsyncContext<Req, Resp>) -> ExecutionResult {
        self.submit(context)
    }
}
