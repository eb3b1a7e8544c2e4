//! The data contracts for one row cycle.
//!
//! `RowSlots` is the source-facing side: the set of bound, writable slots the
//! source table populates in a single read. `RowView` is the target-facing
//! side: the fully-framed values the target store captures when committing
//! the same row. Both borrow from the buffers owned by the binder; neither
//! owns memory.

use crate::registry::ContainerRef;
use crate::types::ElementType;

//==================================================================================
// 1. Source side: writable slots
//==================================================================================

/// One bound, writable slot for a column read.
pub enum SlotMut<'a> {
    /// Raw element bytes. The slot's length is the column's full declared
    /// capacity; a variable-length row fills only a prefix and leaves the
    /// tail untouched (stale).
    Bytes(&'a mut [u8]),
    /// The single reference slot of a container column. The source stores the
    /// handle of the value it produced for the current row.
    Container(&'a mut Option<ContainerRef>),
}

/// All bound slots for one row, in target-schema column order.
pub struct RowSlots<'a> {
    slots: Vec<(&'a str, SlotMut<'a>)>,
}

impl<'a> RowSlots<'a> {
    pub fn new(slots: Vec<(&'a str, SlotMut<'a>)>) -> Self {
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterates `(source column name, slot)` pairs.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut SlotMut<'a>)> {
        self.slots.iter_mut().map(|(name, slot)| (*name, slot))
    }
}

//==================================================================================
// 2. Target side: framed values
//==================================================================================

/// One column's value for the row being committed.
pub enum ColumnValue<'a> {
    /// A scalar or fixed-length array: exactly `len * elem_size` bytes.
    Fixed {
        elem: ElementType,
        len: usize,
        bytes: &'a [u8],
    },
    /// A variable-length sequence, re-framed to this row's actual length.
    Sequence {
        elem: ElementType,
        len: usize,
        bytes: &'a [u8],
    },
    /// A container value, handed over by reference.
    Container(&'a ContainerRef),
}

/// The fully-populated row the target store commits, in schema order.
pub struct RowView<'a> {
    columns: Vec<(&'a str, ColumnValue<'a>)>,
}

impl<'a> RowView<'a> {
    pub fn new(columns: Vec<(&'a str, ColumnValue<'a>)>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterates `(target column name, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnValue<'a>)> {
        self.columns.iter().map(|(name, value)| (*name, value))
    }

    /// Looks a column up by its target name.
    pub fn get(&self, name: &str) -> Option<&ColumnValue<'a>> {
        self.columns
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, value)| value)
    }
}
