//! Error types for centella operations

use thiserror::Error;

use crate::InstSet;

/// Result type for centella operations
pub type Result<T> = std::result::Result<T, CentellaError>;

/// Errors that can occur during centella operations
///
/// Every variant is a contract violation by the caller or integrator, not a
/// transient condition: there is no retry policy, the invocation has to be
/// fixed. Operations validate before touching the destination, so a returned
/// error guarantees the destination was not partially written.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CentellaError {
    /// Destination container has zero size but the operation requires
    /// pre-allocated storage (kernels never allocate on the caller's behalf)
    #[error("destination container has no storage; call assign() before use")]
    UninitializedDestination,

    /// Source container has zero size
    #[error("source container has no storage")]
    UninitializedSource,

    /// Operand dimensions are incompatible for the requested operation
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Expected extent
        expected: usize,
        /// Actual extent
        actual: usize,
    },

    /// A mode parameter has no defined behavior for the element type
    #[error("mode {mode} is not supported for element type {ty}")]
    UnsupportedMode {
        /// Rejected mode
        mode: &'static str,
        /// Element type of the overload
        ty: &'static str,
    },

    /// A forced instruction set has no specialization for the element type
    /// and no generic fallback
    #[error("no {inst:?} specialization for this operation")]
    UnsupportedInstantiation {
        /// Rejected instruction-set tag
        inst: InstSet,
    },
}
