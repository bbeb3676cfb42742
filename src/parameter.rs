/*!
 * Parameter client facade
 *
 * Every lookup flows through the same stack:
 *
 * ```text
 * ParameterClient ──► OperationDispatcher ──► RateController ──► provider
 *                      (retry + expiry)        (admission)        (lookup)
 * ```
 *
 * Callers either hand in their own [`GetParameterContext`] and receive the
 * result through its callback, or use the completion-based helpers which
 * wrap that protocol for `async` and blocking callers.
 */

use crate::config::CpioConfig;
use crate::error::Result;
use cpio_core_async::errors::{map_to_public_error_code, SC_ASYNC_CONTEXT_DROPPED};
use cpio_core_async::{
    define_error_codes, AsyncContext, AsyncOperation, Completion, ExecutionResult,
    ExecutionResultOr, PublicErrorCode,
};
use cpio_core_resilience::{
    OperationDispatcher, RateController, RateControllerConfig, RateControllerState, RetryStrategy,
};
use cpio_observability::{cpio_debug, log_every_period, Logger, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::runtime::Handle;

const COMPONENT: &str = "ParameterClient";
const PROVIDER_COMPONENT: &str = "InMemoryParameterProvider";

/// Component id of the parameter client in the status-code namespace
pub const PARAMETER_COMPONENT: u16 = 0x0101;

define_error_codes! {
    /// Status codes produced by parameter providers
    pub table PARAMETER_ERROR_CODES, component = PARAMETER_COMPONENT;
    SC_PARAMETER_NOT_FOUND = 0x0001, "Parameter not found", NotFound;
    SC_PARAMETER_INVALID_NAME = 0x0002, "Parameter name is empty", InvalidArgument;
    /// Transient; the dispatcher retries it
    SC_PARAMETER_SERVICE_UNAVAILABLE = 0x0003,
        "Parameter service is temporarily unavailable", Unavailable;
}

/// Add the parameter status codes to the process-wide registry
pub fn register_error_codes() {
    cpio_core_async::errors::register_error_codes(PARAMETER_ERROR_CODES);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetParameterRequest {
    pub name: String,
}

impl GetParameterRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetParameterResponse {
    pub value: String,
}

pub type GetParameterContext = AsyncContext<GetParameterRequest, GetParameterResponse>;

/// Parameter store kept in process memory
///
/// Lookups complete on a tokio runtime after `latency`. An empty name is
/// rejected synchronously. With `transient_failure_every = n`, every n-th
/// lookup completes with `Retry(SC_PARAMETER_SERVICE_UNAVAILABLE)`.
pub struct InMemoryParameterProvider {
    runtime: Handle,
    parameters: Arc<RwLock<BTreeMap<String, String>>>,
    latency: Duration,
    transient_failure_every: u64,
    lookups: Arc<AtomicU64>,
    logger: Option<Logger>,
}

impl InMemoryParameterProvider {
    pub fn new(runtime: Handle) -> Self {
        register_error_codes();
        Self {
            runtime,
            parameters: Arc::default(),
            latency: Duration::ZERO,
            transient_failure_every: 0,
            lookups: Arc::default(),
            logger: None,
        }
    }

    pub fn from_config(runtime: Handle, config: &CpioConfig) -> Self {
        Self::new(runtime)
            .with_parameters(config.provider.parameters.clone())
            .with_latency(config.provider.latency())
            .with_transient_failures(config.provider.transient_failure_every)
    }

    pub fn with_parameters<I, K, V>(self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        {
            let mut store = self.parameters.write().unwrap_or_else(PoisonError::into_inner);
            store.extend(parameters.into_iter().map(|(k, v)| (k.into(), v.into())));
        }
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail every `every`-th lookup with a retryable result (0 disables)
    pub fn with_transient_failures(mut self, every: u64) -> Self {
        self.transient_failure_every = every;
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Insert or replace a parameter, returning the previous value
    pub fn put(&self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.parameters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), value.into())
    }

    pub fn remove(&self, name: &str) -> Option<String> {
        self.parameters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    pub fn len(&self) -> usize {
        self.parameters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lookups that reached the provider, including transient failures
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }
}

impl AsyncOperation<GetParameterRequest, GetParameterResponse> for InMemoryParameterProvider {
    fn execute(&self, context: GetParameterContext) -> ExecutionResult {
        if context.request.name.is_empty() {
            return ExecutionResult::failure(SC_PARAMETER_INVALID_NAME);
        }

        let parameters = Arc::clone(&self.parameters);
        let lookups = Arc::clone(&self.lookups);
        let latency = self.latency;
        let every = self.transient_failure_every;
        let logger = self.logger.clone();

        self.runtime.spawn(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }

            let ordinal = lookups.fetch_add(1, Ordering::Relaxed) + 1;
            if every > 0 && ordinal % every == 0 {
                log_every_period!(
                    logger = logger;
                    Severity::Warning,
                    Duration::from_secs(5),
                    PROVIDER_COMPONENT,
                    &context,
                    "simulated outage on lookup {}",
                    ordinal
                );
                context.finish_with(ExecutionResult::retry(SC_PARAMETER_SERVICE_UNAVAILABLE));
                return;
            }

            let value = parameters
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&context.request.name)
                .cloned();
            match value {
                Some(value) => context.finish_with_response(GetParameterResponse { value }),
                None => {
                    cpio_debug!(
                        logger = logger;
                        PROVIDER_COMPONENT,
                        &context,
                        "parameter '{}' not found",
                        context.request.name
                    );
                    context.finish_with(ExecutionResult::failure(SC_PARAMETER_NOT_FOUND));
                }
            }
        });

        ExecutionResult::success()
    }
}

impl std::fmt::Debug for InMemoryParameterProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryParameterProvider")
            .field("parameters", &self.len())
            .field("latency", &self.latency)
            .field("transient_failure_every", &self.transient_failure_every)
            .finish_non_exhaustive()
    }
}

/// Settings for assembling a [`ParameterClient`]
#[derive(Debug, Clone, Default)]
pub struct ParameterClientOptions {
    pub rate_controller: RateControllerConfig,
    pub retry: RetryStrategy,

    /// Timeout applied to contexts built by the client itself
    pub expiration: Option<Duration>,

    /// Log through this logger instead of the global one
    pub logger: Option<Logger>,
}

impl ParameterClientOptions {
    pub fn from_config(config: &CpioConfig) -> Self {
        Self {
            rate_controller: config.rate_controller.clone(),
            retry: config.retry.to_strategy(),
            expiration: Some(config.operation.expiration()),
            logger: None,
        }
    }
}

/// Public entry point for parameter lookups
pub struct ParameterClient<P = InMemoryParameterProvider> {
    dispatcher: OperationDispatcher,
    controller: Arc<RateController<P>>,
    expiration: Option<Duration>,
    logger: Option<Logger>,
}

impl<P> ParameterClient<P>
where
    P: AsyncOperation<GetParameterRequest, GetParameterResponse> + 'static,
{
    /// Compose dispatcher, rate controller and `provider`
    pub fn new(runtime: Handle, provider: P, options: ParameterClientOptions) -> Result<Self> {
        register_error_codes();

        let mut controller = RateController::new(COMPONENT, provider, options.rate_controller)?;
        let mut dispatcher = OperationDispatcher::new(runtime, options.retry)?;
        if let Some(logger) = &options.logger {
            controller = controller.with_logger(logger.clone());
            dispatcher = dispatcher.with_logger(logger.clone());
        }

        Ok(Self {
            dispatcher,
            controller: Arc::new(controller),
            expiration: options.expiration,
            logger: options.logger,
        })
    }

    /// Start a lookup; the result arrives through the context's callback.
    ///
    /// The callback runs exactly once, possibly on a runtime worker thread.
    pub fn get_parameter(&self, context: GetParameterContext) {
        cpio_debug!(
            logger = self.logger;
            COMPONENT,
            &context,
            "get_parameter '{}'",
            context.request.name
        );
        self.dispatcher.dispatch(context, Arc::clone(&self.controller));
    }

    /// Start a lookup and return a handle to its finished context
    pub fn submit(
        &self,
        request: GetParameterRequest,
    ) -> Completion<GetParameterRequest, GetParameterResponse> {
        let (context, completion) = GetParameterContext::with_completion(Arc::new(request));
        let context = match self.expiration {
            Some(timeout) => context.with_timeout(timeout),
            None => context,
        };
        self.get_parameter(context);
        completion
    }

    /// Look up a parameter and await the outcome
    pub async fn get_parameter_async(
        &self,
        request: GetParameterRequest,
    ) -> ExecutionResultOr<GetParameterResponse> {
        settled_value(self.submit(request).await)
    }

    /// Look up a parameter, blocking the calling thread until it settles.
    ///
    /// Must not be called from within an async task on the client's runtime.
    pub fn get_parameter_sync(
        &self,
        request: GetParameterRequest,
    ) -> ExecutionResultOr<GetParameterResponse> {
        settled_value(self.submit(request).wait())
    }

    pub fn rate_controller_state(&self) -> RateControllerState {
        self.controller.state()
    }

    pub fn provider(&self) -> &P {
        self.controller.inner()
    }
}

impl ParameterClient<InMemoryParameterProvider> {
    /// Client backed by an in-memory provider built from `config`
    pub fn from_config(runtime: Handle, config: &CpioConfig) -> Result<Self> {
        config.validate()?;
        let provider = InMemoryParameterProvider::from_config(runtime.clone(), config);
        Self::new(runtime, provider, ParameterClientOptions::from_config(config))
    }
}

impl<P> std::fmt::Debug for ParameterClient<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterClient")
            .field("dispatcher", &self.dispatcher)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

fn settled_value(
    settled: std::result::Result<GetParameterContext, ExecutionResult>,
) -> ExecutionResultOr<GetParameterResponse> {
    let context = match settled {
        Ok(context) => context,
        Err(result) => return ExecutionResultOr::from_result(result),
    };
    if !context.result.successful() {
        return ExecutionResultOr::from_result(context.result);
    }
    match context.response {
        Some(response) => ExecutionResultOr::new(
            Arc::try_unwrap(response).unwrap_or_else(|shared| (*shared).clone()),
        ),
        // a success without a response is reported as missing value
        None => ExecutionResultOr::from_result(ExecutionResult::success()),
    }
}

/// Map an internal result onto the public error taxonomy
pub fn public_error(result: &ExecutionResult) -> PublicErrorCode {
    register_error_codes();
    map_to_public_error_code(result.status_code())
}

/// True for the status a dropped completion reports
pub fn is_dropped(result: &ExecutionResult) -> bool {
    result.status_code() == SC_ASYNC_CONTEXT_DROPPED
}
