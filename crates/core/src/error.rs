//! Centralized error types for the parkgate workspace.

use thiserror::Error;

use crate::types::AccessState;

/// Top-level error enum. Variants map to subsystems.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParkgateError {
    #[error("Invalid slot index: {0}")]
    InvalidSlot(usize),

    #[error("Request ignored: controller busy in {0}")]
    Busy(AccessState),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ParkgateResult<T> = Result<T, ParkgateError>;
