//! Process-wide fallback logger
//!
//! Components prefer an injected [`Logger`]. The global logger exists for
//! the process-entry boundary: install it with [`init`] before any component
//! logs, and tear it down with [`shutdown`] after the last one finishes.
//! While unset, records without an injected logger are dropped.

use crate::logger::Logger;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

static GLOBAL_LOGGER: RwLock<Option<Logger>> = RwLock::new(None);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GlobalLoggerError {
    #[error("global logger is already initialized")]
    AlreadyInitialized,
}

/// Install the global logger; fails if one is already installed
pub fn init(logger: Logger) -> Result<(), GlobalLoggerError> {
    let mut slot = GLOBAL_LOGGER.write().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        return Err(GlobalLoggerError::AlreadyInitialized);
    }
    *slot = Some(logger);
    Ok(())
}

/// Remove the global logger, flushing it first
pub fn shutdown() -> Option<Logger> {
    let previous = GLOBAL_LOGGER
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(logger) = &previous {
        logger.flush();
    }
    previous
}

/// Handle to the global logger, if installed
pub fn logger() -> Option<Logger> {
    GLOBAL_LOGGER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

pub fn is_initialized() -> bool {
    GLOBAL_LOGGER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .is_some()
}
