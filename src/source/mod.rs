//! The source-table contract: the row-oriented input store a conversion
//! consumes.
//!
//! A source table enumerates its columns (name, element-type tag, declared
//! static length, optional length-indicator reference, runtime storage kind),
//! reports its row count, populates all bound slots for one row in a single
//! read, and reports per-row actual lengths for variable columns.

use crate::error::PivotError;
use crate::row::RowSlots;
use crate::types::ElementType;

pub mod memory;

pub use memory::{MemoryDataset, MemoryTable, TableBuilder};

/// A reference to the companion column that stores a variable column's
/// per-row length, together with that indicator's declared upper bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterRef {
    /// Source name of the length-indicator column.
    pub name: String,
    /// Declared maximum length over all rows; sizes the working buffer.
    pub max_len: usize,
}

/// The runtime storage kind of one source column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnStorage {
    /// A primitive leaf: scalar, fixed-length array, or (when `counter` is
    /// set) a variable-length array framed by its length indicator.
    Leaf {
        elem: ElementType,
        /// Declared static length: 1 for scalars, N for fixed arrays.
        /// Meaningless when `counter` is set.
        static_len: usize,
        counter: Option<CounterRef>,
    },
    /// An opaque aggregate with an externally-defined type. Detected by the
    /// column's runtime storage kind, never by its declared leaf type.
    Aggregate { type_name: String },
}

/// Declared metadata for one source column.
#[derive(Debug, Clone)]
pub struct SourceColumn {
    pub name: String,
    pub storage: ColumnStorage,
}

/// The row-oriented input store.
pub trait SourceTable {
    /// The table identifier.
    fn name(&self) -> &str;

    /// Declared column metadata, in source order.
    fn columns(&self) -> Vec<SourceColumn>;

    /// Total row count.
    fn row_count(&self) -> u64;

    /// Populates every bound slot for `row` in one read. Variable columns
    /// fill only the actual-length prefix of their slot; the tail keeps
    /// whatever bytes a previous row left there.
    fn read_row(&mut self, row: u64, slots: &mut RowSlots<'_>) -> Result<(), PivotError>;

    /// The actual element count of a variable column at `row`.
    fn variable_len(&self, row: u64, column: &str) -> Result<usize, PivotError>;

    /// Hint that the source engine may parallelize its internal decompression
    /// and I/O. Does not change the logical row stream.
    fn enable_multithreaded_io(&mut self, _enabled: bool) {}
}
