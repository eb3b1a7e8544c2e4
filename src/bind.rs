//! The Buffer Binder: owns the per-column memory the source table writes
//! into on each row read and the per-column state the target store captures
//! on each row commit.
//!
//! Binding rules, per column shape:
//!
//! - **Flat**: one buffer of `len * elem_size` bytes, shared by both sides.
//!   The source writes the row into it and the target captures the same
//!   bytes; no copy happens at transfer time.
//! - **Variable**: a source buffer of the full `max_len * elem_size` capacity
//!   and a *distinct* target buffer whose visible length is re-framed to the
//!   row's actual byte length before the copy. They are never the same
//!   memory: the source capacity stays fixed while the target length changes
//!   every row.
//! - **Container**: a single reference slot. The source stores the handle of
//!   the value it produced; the target captures that same instance by
//!   reference.
//!
//! All buffers live exactly as long as one conversion; the facade owns the
//! binder, and the source-read and target-commit steps borrow from it.

use std::sync::Arc;

use hashbrown::HashMap;

use crate::classify::{ColumnDescriptor, ContainerColumn, FlatColumn, VariableColumn};
use crate::error::PivotError;
use crate::registry::{ContainerRef, ContainerType};
use crate::row::{ColumnValue, RowSlots, RowView, SlotMut};

/// One column's bound buffers.
pub(crate) enum BoundColumn {
    Flat {
        desc: FlatColumn,
        /// Shared between source read and target commit.
        buf: Vec<u8>,
    },
    Variable {
        desc: VariableColumn,
        /// Fixed capacity `max_len * elem_size`; rows fill a prefix.
        source_buf: Vec<u8>,
        /// Re-framed to the actual byte length every row.
        target_buf: Vec<u8>,
    },
    Container {
        desc: ContainerColumn,
        ty: Arc<ContainerType>,
        /// Populated by the source on every read.
        slot: Option<ContainerRef>,
    },
}

/// All bound buffers for one conversion.
pub(crate) struct ColumnBindings {
    columns: Vec<BoundColumn>,
}

impl std::fmt::Debug for ColumnBindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnBindings")
            .field("columns", &self.columns.len())
            .finish()
    }
}

impl ColumnBindings {
    /// Allocates buffers for every descriptor. Container descriptors bind to
    /// their pre-resolved type; a missing resolution here is a logic error
    /// (the facade resolves all container types before the schema is built).
    pub(crate) fn bind(
        descriptors: &[ColumnDescriptor],
        resolved: &HashMap<String, Arc<ContainerType>>,
    ) -> Result<Self, PivotError> {
        let mut columns = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let bound = match descriptor {
                ColumnDescriptor::Flat(desc) => BoundColumn::Flat {
                    buf: vec![0; desc.len * desc.elem_size],
                    desc: desc.clone(),
                },
                ColumnDescriptor::Variable(desc) => BoundColumn::Variable {
                    source_buf: vec![0; desc.max_len * desc.elem_size],
                    target_buf: Vec::with_capacity(desc.max_len * desc.elem_size),
                    desc: desc.clone(),
                },
                ColumnDescriptor::Container(desc) => {
                    let ty = resolved.get(&desc.type_name).cloned().ok_or_else(|| {
                        PivotError::InternalError(format!(
                            "container type '{}' was not resolved before binding",
                            desc.type_name
                        ))
                    })?;
                    BoundColumn::Container { desc: desc.clone(), ty, slot: None }
                }
            };
            columns.push(bound);
        }
        Ok(Self { columns })
    }

    pub(crate) fn columns_mut(&mut self) -> impl Iterator<Item = &mut BoundColumn> {
        self.columns.iter_mut()
    }

    /// The writable slots the source table populates for one row, keyed by
    /// source column name, in schema order.
    pub(crate) fn source_slots(&mut self) -> RowSlots<'_> {
        let slots = self
            .columns
            .iter_mut()
            .map(|column| match column {
                BoundColumn::Flat { desc, buf } => {
                    (desc.source_name.as_str(), SlotMut::Bytes(buf.as_mut_slice()))
                }
                BoundColumn::Variable { desc, source_buf, .. } => {
                    (desc.source_name.as_str(), SlotMut::Bytes(source_buf.as_mut_slice()))
                }
                BoundColumn::Container { desc, slot, .. } => {
                    (desc.source_name.as_str(), SlotMut::Container(slot))
                }
            })
            .collect();
        RowSlots::new(slots)
    }

    /// The fully-framed row the target store captures, keyed by target column
    /// name, in schema order. Container values are checked against their
    /// resolved type descriptor.
    pub(crate) fn row_view(&self, row: u64) -> Result<RowView<'_>, PivotError> {
        let mut columns = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let entry = match column {
                BoundColumn::Flat { desc, buf } => (
                    desc.target_name.as_str(),
                    ColumnValue::Fixed { elem: desc.elem, len: desc.len, bytes: buf },
                ),
                BoundColumn::Variable { desc, target_buf, .. } => (
                    desc.target_name.as_str(),
                    ColumnValue::Sequence {
                        elem: desc.elem,
                        len: target_buf.len() / desc.elem_size,
                        bytes: target_buf,
                    },
                ),
                BoundColumn::Container { desc, ty, slot } => {
                    let value = slot.as_ref().ok_or_else(|| {
                        PivotError::InternalError(format!(
                            "container column '{}' was not populated at row {row}",
                            desc.source_name
                        ))
                    })?;
                    if !ty.matches(value) {
                        return Err(PivotError::TransferError {
                            row,
                            source: Box::new(PivotError::ResolutionError(format!(
                                "value in column '{}' is not an instance of '{}'",
                                desc.source_name,
                                ty.name()
                            ))),
                        });
                    }
                    (desc.target_name.as_str(), ColumnValue::Container(value))
                }
            };
            columns.push(entry);
        }
        Ok(RowView::new(columns))
    }
}
