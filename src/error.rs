/*!
 * Error types for CPIO setup and tooling
 *
 * Individual cloud operations never fail with these: their outcome is an
 * `ExecutionResult`. `CpioError` covers what can go wrong before an operation
 * is ever dispatched (loading configuration, installing logging, wiring the
 * resilience stack).
 */

use cpio_core_resilience::ResilienceError;
use cpio_observability::LoggerError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CpioError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug, Error)]
pub enum CpioError {
    /// Configuration value rejected by validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be read or written
    #[error("Cannot access config file {}: {source}", .path.display())]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Cannot serialize configuration: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Log subscriber or sink could not be installed
    #[error("Logging error: {0}")]
    Logging(String),

    #[error("Log sink error: {0}")]
    LogSink(#[from] LoggerError),

    #[error(transparent)]
    Resilience(#[from] ResilienceError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CpioError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CpioError::Config(_)
            | CpioError::ConfigFile { .. }
            | CpioError::TomlParse(_)
            | CpioError::TomlSerialize(_)
            | CpioError::Resilience(_) => EXIT_FATAL,
            CpioError::Logging(_) | CpioError::LogSink(_) | CpioError::Io(_) => EXIT_PARTIAL,
        }
    }

    /// True when the error stems from the user's configuration
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            CpioError::Config(_)
                | CpioError::ConfigFile { .. }
                | CpioError::TomlParse(_)
                | CpioError::Resilience(ResilienceError::InvalidConfig(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CpioError::Config("bad".into()).exit_code(), EXIT_FATAL);
        assert_eq!(
            CpioError::Resilience(ResilienceError::InvalidConfig("max".into())).exit_code(),
            EXIT_FATAL
        );
        assert_eq!(CpioError::Logging("filter".into()).exit_code(), EXIT_PARTIAL);
        assert_eq!(
            CpioError::Io(io::Error::other("disk")).exit_code(),
            EXIT_PARTIAL
        );
    }

    #[test]
    fn test_exit_code_constants() {
        assert_eq!(EXIT_SUCCESS, 0);
        assert_eq!(EXIT_PARTIAL, 1);
        assert_eq!(EXIT_FATAL, 2);
    }

    #[test]
    fn test_display() {
        let err = CpioError::ConfigFile {
            path: PathBuf::from("/etc/cpio.toml"),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(
            err.to_string(),
            "Cannot access config file /etc/cpio.toml: missing"
        );

        let err: CpioError = ResilienceError::RuntimeUnavailable("none".into()).into();
        assert_eq!(err.to_string(), "No tokio runtime available: none");
    }

    #[test]
    fn test_toml_conversion() {
        let parse = toml::from_str::<toml::Table>("= broken").unwrap_err();
        let err: CpioError = parse.into();
        assert!(err.is_config_error());
        assert!(err.to_string().starts_with("Invalid TOML"));
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error as _;
        let err = CpioError::ConfigFile {
            path: PathBuf::from("x"),
            source: io::Error::other("denied"),
        };
        assert!(err.source().is_some());
        assert!(CpioError::Logging("x".into()).source().is_none());
    }
}
