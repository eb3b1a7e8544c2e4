//! The target-store contract: the columnar output store a conversion writes.
//!
//! A target store accepts an opaque compression setting, constructs columns
//! from target type strings (and may reject a string it cannot represent),
//! freezes the column set, commits fully-populated rows, and finalizes on
//! completion. The engine only ever calls this write API; the store's binary
//! encoding is its own business.

use crate::error::PivotError;
use crate::row::RowView;

pub mod arrow_impl;
pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::ColumnStore;

/// The columnar output store.
pub trait TargetStore {
    /// Accepts the opaque compression configuration value. Interpreted (or
    /// ignored) entirely by the store.
    fn set_compression(&mut self, setting: i32);

    /// Constructs a column of the given target type under the given name.
    /// Fails if the type string is unsupported by this store.
    fn add_column(&mut self, name: &str, type_spec: &str) -> Result<(), PivotError>;

    /// Freezes the column set; no columns may be added afterwards.
    fn freeze_schema(&mut self) -> Result<(), PivotError>;

    /// Commits one fully-populated row, in schema order.
    fn commit_row(&mut self, row: RowView<'_>) -> Result<(), PivotError>;

    /// Flushes and closes the store. After a successful finalize the store
    /// contains exactly the declared columns and all committed rows.
    fn finalize(&mut self) -> Result<(), PivotError>;
}
