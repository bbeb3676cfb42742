/*!
 * Configuration types for CPIO
 */

use crate::error::{CpioError, Result};
use cpio_core_resilience::{BackoffKind, RateControllerConfig, RetryStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration, one TOML table per section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpioConfig {
    pub logging: LoggingConfig,
    pub rate_controller: RateControllerConfig,
    pub retry: RetryConfig,
    pub operation: OperationConfig,
    pub provider: ProviderConfig,
}

/// Diagnostic output settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level used when `RUST_LOG` is unset
    pub level: LogLevel,

    pub format: LogFormat,

    /// Write diagnostics to this file instead of stdout
    pub file: Option<PathBuf>,

    /// Also append CPIO log records as JSON lines to this file
    pub records_file: Option<PathBuf>,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Compact,
    /// One JSON object per event
    Json,
}

/// Back-off settings for the operation dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub kind: BackoffKind,
    pub delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_retries: usize,

    /// Random fraction of the delay added to each back-off, in [0, 1]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let strategy = RetryStrategy::default();
        Self {
            kind: strategy.kind,
            delay_ms: duration_ms(strategy.delay),
            max_delay_ms: duration_ms(strategy.max_delay),
            max_retries: strategy.max_retries,
            jitter: strategy.jitter_factor,
        }
    }
}

impl RetryConfig {
    pub fn to_strategy(&self) -> RetryStrategy {
        RetryStrategy::new(self.kind, Duration::from_millis(self.delay_ms), self.max_retries)
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_jitter(self.jitter)
    }
}

/// Per-operation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationConfig {
    /// Lifetime of a root context before the dispatcher expires it
    pub expiration_secs: u64,
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            expiration_secs: cpio_core_async::DEFAULT_EXPIRATION.as_secs(),
        }
    }
}

impl OperationConfig {
    pub fn expiration(&self) -> Duration {
        Duration::from_secs(self.expiration_secs)
    }
}

/// In-memory parameter provider settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Simulated service latency before each completion
    pub latency_ms: u64,

    /// Every n-th lookup completes with a transient retryable result (0 = never)
    pub transient_failure_every: u64,

    /// Parameters served by the provider
    pub parameters: BTreeMap<String, String>,
}

impl ProviderConfig {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

impl CpioConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| CpioError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        let config: CpioConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|source| CpioError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every section for out-of-range values
    pub fn validate(&self) -> Result<()> {
        self.rate_controller.validate()?;
        self.retry.to_strategy().validate()?;
        if self.operation.expiration_secs == 0 {
            return Err(CpioError::Config(
                "operation.expiration_secs must be greater than zero".to_string(),
            ));
        }
        if self.parameters_contain_empty_name() {
            return Err(CpioError::Config(
                "provider.parameters contains an empty name".to_string(),
            ));
        }
        Ok(())
    }

    fn parameters_contain_empty_name(&self) -> bool {
        self.provider.parameters.keys().any(|name| name.is_empty())
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
