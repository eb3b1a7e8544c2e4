//! The Transfer Loop: streams every row of the source table into the target
//! store through the bound buffers.
//!
//! Rows run in strictly increasing index order, none skipped, none repeated.
//! Per row: one source read populates all bound slots, each variable column
//! is re-framed to its actual length, the row is committed, and the optional
//! progress callback observes `(rows_done, rows_total)`.
//!
//! The central correctness invariant lives in `reframe_variable_columns`: a
//! variable column's observed length is authoritative per row, and the target
//! buffer's visible length is set to match it *before* the byte copy. Bytes
//! past the actual length in the source buffer are stale leftovers of
//! earlier, longer rows and must never be copied.

use crate::bind::{BoundColumn, ColumnBindings};
use crate::error::PivotError;
use crate::source::SourceTable;
use crate::target::TargetStore;

/// The progress observer: called with `(rows_done, rows_total)` after each
/// commit. Read-only; it must not perturb buffers.
pub type ProgressFn = Box<dyn FnMut(u64, u64) + Send>;

/// Copies every row from `source` into `target`. Returns the number of rows
/// committed. A zero-row source performs zero iterations and is valid.
pub(crate) fn transfer_rows(
    source: &mut dyn SourceTable,
    bindings: &mut ColumnBindings,
    target: &mut dyn TargetStore,
    mut progress: Option<&mut ProgressFn>,
) -> Result<u64, PivotError> {
    let total = source.row_count();
    for row in 0..total {
        {
            let mut slots = bindings.source_slots();
            source
                .read_row(row, &mut slots)
                .map_err(|e| e.at_row(row))?;
        }
        reframe_variable_columns(row, source, bindings)?;
        let view = bindings.row_view(row)?;
        target.commit_row(view).map_err(|e| e.at_row(row))?;
        if let Some(callback) = progress.as_mut() {
            callback(row + 1, total);
        }
    }
    Ok(total)
}

/// Re-frames every variable column for the current row: reads the row's
/// actual length, sets the target buffer's visible length to exactly that
/// many bytes, then copies that prefix from the source buffer.
fn reframe_variable_columns(
    row: u64,
    source: &dyn SourceTable,
    bindings: &mut ColumnBindings,
) -> Result<(), PivotError> {
    for column in bindings.columns_mut() {
        let BoundColumn::Variable { desc, source_buf, target_buf } = column else {
            continue;
        };
        let actual_len = source
            .variable_len(row, &desc.source_name)
            .map_err(|e| e.at_row(row))?;
        if actual_len > desc.max_len {
            return Err(PivotError::TransferError {
                row,
                source: Box::new(PivotError::SourceError(format!(
                    "column '{}': actual length {actual_len} exceeds the declared maximum {}",
                    desc.source_name, desc.max_len
                ))),
            });
        }
        let byte_len = actual_len * desc.elem_size;
        // Length first, then the copy; never the other way around.
        target_buf.resize(byte_len, 0);
        target_buf.copy_from_slice(&source_buf[..byte_len]);
    }
    Ok(())
}
