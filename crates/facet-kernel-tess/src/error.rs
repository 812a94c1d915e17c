//! Error types for the tessellation core.

use thiserror::Error;

/// Errors that can occur while building, reading, or editing a
/// tessellation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TessError {
    /// A required object reference was absent.
    #[error("null object")]
    NullObject,

    /// The referenced entity is not a tessellation.
    #[error("not a tessellation object")]
    NotATessellation,

    /// The source entity is not a Body.
    #[error("not a body")]
    NotABody,

    /// The operation needs Faces but the Body is a wire.
    #[error("wire body has no faces")]
    WireBody,

    /// A degenerate Edge where a real one is required.
    #[error("degenerate edge {0}")]
    DegenerateEdge(usize),

    /// An index outside its valid range.
    #[error("index {index} out of range [{lo}-{hi}]")]
    IndexOutOfRange {
        /// Offending index.
        index: i64,
        /// Lowest valid value.
        lo: i64,
        /// Highest valid value.
        hi: i64,
    },

    /// A parameter outside its valid interval.
    #[error("parameter {value} outside ({lo}, {hi})")]
    ParameterOutOfRange {
        /// Offending parameter.
        value: f64,
        /// Exclusive lower bound.
        lo: f64,
        /// Exclusive upper bound.
        hi: f64,
    },

    /// Topology inconsistent with the tessellation record.
    #[error("topology mismatch: {0}")]
    TopologyMismatch(String),

    /// A geometric constraint of the operation was violated.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// A referenced entity was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Data requested before it was built.
    #[error("no data yet")]
    NoDataYet,

    /// Geometric evaluation failed or produced a degenerate result.
    #[error("geometry error: {0}")]
    GeometryError(String),

    /// Storage could not be grown.
    #[error("allocation failure")]
    AllocationFailure,
}

/// Result type for tessellation operations.
pub type Result<T> = std::result::Result<T, TessError>;
