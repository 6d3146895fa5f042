//! Error types for planning and tile execution.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse failure class. Every class aborts the whole kernel invocation;
/// no core recovers on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClass {
    /// The planner could not produce a plan; nothing may be launched.
    Planning,
    /// An executor was launched against a plan or memory region it cannot
    /// interpret.
    Configuration,
    /// A buffer request exceeded what the plan budgeted. Unreachable for plans
    /// produced by the planner.
    ResourceExhaustion,
}

/// Errors that can occur while planning or executing a tiled kernel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileError {
    /// No cores to plan for.
    #[error("cannot plan for zero cores")]
    ZeroCoreCount,

    /// A descriptor or profile field has a value planning cannot use.
    #[error("invalid workload descriptor: {0}")]
    InvalidDescriptor(String),

    /// Arithmetic on descriptor fields overflowed.
    #[error("arithmetic overflow while planning: {0}")]
    Overflow(String),

    /// Not even one aligned group of units fits the scratchpad.
    #[error(
        "workload does not fit scratchpad: one aligned tile needs {required} bytes, {available} available"
    )]
    DoesNotFitScratchpad { required: usize, available: usize },

    /// Executor launched with a core index the plan does not know.
    #[error("core index {core} out of range for {core_count} cores")]
    CoreIndexOutOfRange { core: usize, core_count: usize },

    /// Serialized plan bytes are absent, truncated, or inconsistent.
    #[error("malformed tiling plan: {0}")]
    MalformedPlan(String),

    /// A global memory region is smaller than the plan addresses.
    #[error("{region} region holds {actual} elements, plan requires {required}")]
    RegionTooSmall {
        region: &'static str,
        required: usize,
        actual: usize,
    },

    /// Scratchpad reservation beyond capacity.
    #[error("scratchpad exhausted: requested {requested} bytes, {available} of {capacity} free")]
    ScratchpadExhausted {
        requested: usize,
        available: usize,
        capacity: usize,
    },

    /// A pipeline stage touched a buffer instance that had not been released
    /// by the stage before it.
    #[error("fence violation on {queue} queue: {detail}")]
    FenceViolation { queue: &'static str, detail: String },
}

impl TileError {
    /// The failure class this error belongs to.
    pub fn class(&self) -> ErrorClass {
        match self {
            TileError::ZeroCoreCount
            | TileError::InvalidDescriptor(_)
            | TileError::Overflow(_)
            | TileError::DoesNotFitScratchpad { .. } => ErrorClass::Planning,
            TileError::CoreIndexOutOfRange { .. }
            | TileError::MalformedPlan(_)
            | TileError::RegionTooSmall { .. } => ErrorClass::Configuration,
            TileError::ScratchpadExhausted { .. } | TileError::FenceViolation { .. } => {
                ErrorClass::ResourceExhaustion
            }
        }
    }
}

/// Result type for planning and execution.
pub type Result<T> = std::result::Result<T, TileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(TileError::ZeroCoreCount.class(), ErrorClass::Planning);
        assert_eq!(
            TileError::DoesNotFitScratchpad {
                required: 64,
                available: 32
            }
            .class(),
            ErrorClass::Planning
        );
        assert_eq!(
            TileError::CoreIndexOutOfRange {
                core: 9,
                core_count: 8
            }
            .class(),
            ErrorClass::Configuration
        );
        assert_eq!(
            TileError::MalformedPlan("short".into()).class(),
            ErrorClass::Configuration
        );
        assert_eq!(
            TileError::FenceViolation {
                queue: "input",
                detail: "x".into()
            }
            .class(),
            ErrorClass::ResourceExhaustion
        );
    }

    #[test]
    fn test_error_messages() {
        let err = TileError::DoesNotFitScratchpad {
            required: 4096,
            available: 1024,
        };
        assert_eq!(
            err.to_string(),
            "workload does not fit scratchpad: one aligned tile needs 4096 bytes, 1024 available"
        );
        let err = TileError::CoreIndexOutOfRange {
            core: 12,
            core_count: 8,
        };
        assert_eq!(err.to_string(), "core index 12 out of range for 8 cores");
    }
}
