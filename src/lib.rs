/*!
 * CPIO - Cloud provider abstraction layer
 *
 * Public client facade over the async execution core:
 * - `ExecutionResult` outcomes and the async context protocol (`cpio-core-async`)
 * - Admission control and retry dispatch (`cpio-core-resilience`)
 * - Correlated, throttled logging (`cpio-observability`)
 *
 * The only cloud operation shipped here is a parameter lookup backed by an
 * in-memory provider; it exercises the whole stack end to end.
 */

pub mod config;
pub mod error;
pub mod logging;
pub mod parameter;
pub mod stress;

// Re-export commonly used types
pub use config::{CpioConfig, LogFormat, LogLevel};
pub use error::{CpioError, Result};
pub use parameter::{
    public_error, GetParameterContext, GetParameterRequest, GetParameterResponse,
    InMemoryParameterProvider, ParameterClient, ParameterClientOptions,
};
pub use stress::{run_stress, StressOptions, StressReport};

pub use cpio_core_async as core_async;
pub use cpio_core_resilience as resilience;
pub use cpio_observability as observability;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
