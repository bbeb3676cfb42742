/*!
 * Concurrent lookup driver for the `cpio stress` command
 *
 * Submits every request at once so the rate controller saturates, then
 * awaits all completions and tallies how the stack handled them.
 */

use crate::parameter::{public_error, GetParameterRequest, GetParameterResponse, ParameterClient};
use cpio_core_async::{AsyncOperation, ExecutionResult, ExecutionStatus};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

/// What to submit
#[derive(Debug, Clone)]
pub struct StressOptions {
    pub requests: usize,

    /// Request `i` looks up `names[i % names.len()]`
    pub names: Vec<String>,
}

/// Outcome tallies of one stress run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StressReport {
    pub requests: usize,
    pub succeeded: usize,
    pub failed: usize,

    /// Settled as Retry (only when a provider returns Retry past the dispatcher)
    pub retry_pending: usize,

    /// Contexts dropped before completion
    pub dropped: usize,

    /// Requests that needed at least one retry
    pub retried_requests: usize,

    /// Sum of retry counts over all requests
    pub total_retries: usize,

    /// Submits admitted by the rate controller, retries included
    pub admitted: u64,

    /// Submits rejected by the rate controller, retries included
    pub throttled: u64,

    /// Failures grouped by public error code
    pub errors: BTreeMap<String, usize>,

    pub elapsed_ms: u128,
}

impl StressReport {
    fn record(&mut self, result: &ExecutionResult, retry_count: usize) {
        if retry_count > 0 {
            self.retried_requests += 1;
            self.total_retries += retry_count;
        }
        match result.status() {
            ExecutionStatus::Success => self.succeeded += 1,
            ExecutionStatus::Retry => self.retry_pending += 1,
            ExecutionStatus::Failure => self.failed += 1,
        }
        if !result.successful() {
            *self
                .errors
                .entry(public_error(result).to_string())
                .or_default() += 1;
        }
    }
}

impl fmt::Display for StressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "requests:         {}", self.requests)?;
        writeln!(f, "succeeded:        {}", self.succeeded)?;
        writeln!(f, "failed:           {}", self.failed)?;
        if self.retry_pending > 0 {
            writeln!(f, "retry pending:    {}", self.retry_pending)?;
        }
        if self.dropped > 0 {
            writeln!(f, "dropped:          {}", self.dropped)?;
        }
        writeln!(f, "admitted:         {}", self.admitted)?;
        writeln!(f, "throttled:        {}", self.throttled)?;
        writeln!(
            f,
            "retried:          {} requests, {} retries",
            self.retried_requests, self.total_retries
        )?;
        for (code, count) in &self.errors {
            writeln!(f, "  {:<16}{}", code, count)?;
        }
        write!(f, "elapsed:          {} ms", self.elapsed_ms)
    }
}

/// Drive `options.requests` concurrent lookups through `client`
pub async fn run_stress<P>(client: &ParameterClient<P>, options: &StressOptions) -> StressReport
where
    P: AsyncOperation<GetParameterRequest, GetParameterResponse> + 'static,
{
    let started = Instant::now();
    let before = client.rate_controller_state();

    let completions: Vec<_> = (0..options.requests)
        .map(|i| {
            let name = if options.names.is_empty() {
                String::new()
            } else {
                options.names[i % options.names.len()].clone()
            };
            client.submit(GetParameterRequest::new(name))
        })
        .collect();

    let mut report = StressReport {
        requests: options.requests,
        ..Default::default()
    };
    for settled in join_all(completions).await {
        match settled {
            Ok(context) => report.record(&context.result, context.retry_count),
            Err(result) => {
                report.dropped += 1;
                report.record(&result, 0);
            }
        }
    }

    let after = client.rate_controller_state();
    report.admitted = after.admitted_total - before.admitted_total;
    report.throttled = after.throttled_total - before.throttled_total;
    report.elapsed_ms = started.elapsed().as_millis();
    report
}
