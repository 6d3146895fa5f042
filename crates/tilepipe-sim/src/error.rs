//! Error types for the simulated core array.

use thiserror::Error;
use tilepipe::{ErrorClass, TileError};

/// Errors that can occur while configuring or driving a [`SimDevice`](crate::SimDevice).
#[derive(Debug, Error)]
pub enum SimError {
    /// Planning or execution failed inside a core.
    #[error(transparent)]
    Tile(#[from] TileError),

    /// Device configuration could not be parsed or serialized.
    #[error("Invalid device configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Host data does not match the declared shape.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
}

impl SimError {
    /// Failure class, using the core library's taxonomy. Configuration and
    /// shape errors are [`ErrorClass::Configuration`].
    pub fn class(&self) -> ErrorClass {
        match self {
            SimError::Tile(e) => e.class(),
            SimError::Config(_) | SimError::DimensionMismatch(_) => ErrorClass::Configuration,
        }
    }
}

/// Result type for simulator operations.
pub type Result<T> = std::result::Result<T, SimError>;
