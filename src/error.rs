//! This module defines the single, unified error type for the entire rowpivot
//! library. It uses the `thiserror` crate to provide ergonomic, context-aware
//! error handling.
//!
//! Every fatal condition of a conversion surfaces through `PivotError`; none
//! are retried automatically. Retry, if desired, is the caller's
//! responsibility.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PivotError {
    // =========================================================================
    // === Fatal conversion categories (reported before or during transfer)
    // =========================================================================
    /// Invalid configuration (unknown compression shorthand, duplicate target
    /// column name, empty required parameter). Raised before any I/O.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// A named external type descriptor could not be resolved, or a container
    /// column's type name was rejected. Raised before row transfer begins.
    #[error("Type resolution failed: {0}")]
    ResolutionError(String),

    /// The source location or the requested table identifier is missing, or a
    /// source read contract was violated.
    #[error("Source table error: {0}")]
    SourceError(String),

    /// A target type string was rejected or the target schema was misused.
    #[error("Target schema error: {0}")]
    SchemaError(String),

    /// A failure while reading, re-framing, or committing one row. Aborts the
    /// remainder of the conversion; already-committed rows remain.
    #[error("Row transfer failed at row {row}: {source}")]
    TransferError {
        row: u64,
        #[source]
        source: Box<PivotError>,
    },

    // =========================================================================
    // === Supporting errors
    // =========================================================================
    #[error("Unsupported data type for this operation: {0}")]
    UnsupportedType(String),

    #[error("Internal logic error (this is a bug): {0}")]
    InternalError(String),

    // =========================================================================
    // === External error wrappers (using #[from] for automatic conversion)
    // =========================================================================
    /// An error originating from the underlying I/O subsystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, typically during footer
    /// serialization.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// An error from a safe byte-casting operation failing.
    #[error("Byte slice casting error: {0}")]
    PodCast(String), // Manual `From` impl; bytemuck::PodCastError doesn't impl Error.

    #[error("Zstd operation failed: {0}")]
    ZstdError(String),
}

impl PivotError {
    /// Wraps any error into the row-transfer category, tagging the failing
    /// row index. Errors that are already row-tagged pass through unchanged.
    pub fn at_row(self, row: u64) -> Self {
        match self {
            err @ PivotError::TransferError { .. } => err,
            other => PivotError::TransferError {
                row,
                source: Box::new(other),
            },
        }
    }
}

// =============================================================================
// === Manual `From` Implementations ===
// =============================================================================

impl From<bytemuck::PodCastError> for PivotError {
    fn from(err: bytemuck::PodCastError) -> Self {
        PivotError::PodCast(err.to_string())
    }
}
