//! An in-memory source dataset, used by tests, benches, and the demo
//! drivers.
//!
//! `MemoryTable` stores rows column-wise and plays the row-oriented store's
//! part faithfully: reads populate bound slots, variable columns fill only
//! their actual-length prefix (the slot tail keeps stale bytes from earlier
//! rows), and container columns hand out shared references to the stored
//! values.

use std::any::Any;
use std::sync::Arc;

use crate::error::PivotError;
use crate::registry::ContainerRef;
use crate::row::{RowSlots, SlotMut};
use crate::source::{ColumnStorage, CounterRef, SourceColumn, SourceTable};
use crate::types::{Element, ElementType};

//==================================================================================
// 1. Column storage
//==================================================================================

enum ColumnRows {
    Flat {
        elem: ElementType,
        len: usize,
        bytes: Vec<u8>,
    },
    Variable {
        elem: ElementType,
        counter: String,
        max_len: usize,
        rows: Vec<Vec<u8>>,
    },
    Container {
        type_name: String,
        rows: Vec<ContainerRef>,
    },
}

struct MemoryColumn {
    name: String,
    data: ColumnRows,
}

impl MemoryColumn {
    fn row_count(&self) -> usize {
        match &self.data {
            ColumnRows::Flat { elem, len, bytes } => bytes.len() / (elem.size_in_bytes() * len),
            ColumnRows::Variable { rows, .. } => rows.len(),
            ColumnRows::Container { rows, .. } => rows.len(),
        }
    }
}

//==================================================================================
// 2. MemoryTable + builder
//==================================================================================

/// A row-oriented table held in memory.
pub struct MemoryTable {
    name: String,
    columns: Vec<MemoryColumn>,
    rows: u64,
}

impl std::fmt::Debug for MemoryTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTable")
            .field("name", &self.name)
            .field("rows", &self.rows)
            .field(
                "columns",
                &self.columns.iter().map(|c| &c.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl MemoryTable {
    pub fn builder(name: &str) -> TableBuilder {
        TableBuilder {
            name: name.to_string(),
            columns: Vec::new(),
        }
    }

    fn column(&self, name: &str) -> Option<&MemoryColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Column-wise builder for `MemoryTable`. Row counts across columns and the
/// counter contract of variable columns are validated in `build`.
pub struct TableBuilder {
    name: String,
    columns: Vec<MemoryColumn>,
}

impl TableBuilder {
    /// A scalar column, one value per row.
    pub fn scalar<T: Element>(mut self, name: &str, values: &[T]) -> Self {
        self.columns.push(MemoryColumn {
            name: name.to_string(),
            data: ColumnRows::Flat {
                elem: T::ELEM,
                len: 1,
                bytes: bytemuck::cast_slice(values).to_vec(),
            },
        });
        self
    }

    /// A fixed-length array column; `values` holds `rows * len` elements.
    pub fn fixed<T: Element>(mut self, name: &str, len: usize, values: &[T]) -> Self {
        self.columns.push(MemoryColumn {
            name: name.to_string(),
            data: ColumnRows::Flat {
                elem: T::ELEM,
                len,
                bytes: bytemuck::cast_slice(values).to_vec(),
            },
        });
        self
    }

    /// A variable-length column framed by the named counter column. The
    /// counter must be an `i32` scalar column whose per-row values equal the
    /// row lengths given here.
    pub fn variable<T: Element>(mut self, name: &str, counter: &str, rows: &[Vec<T>]) -> Self {
        let byte_rows = rows
            .iter()
            .map(|row| bytemuck::cast_slice(row.as_slice()).to_vec())
            .collect::<Vec<_>>();
        let max_len = rows.iter().map(Vec::len).max().unwrap_or(0);
        self.columns.push(MemoryColumn {
            name: name.to_string(),
            data: ColumnRows::Variable {
                elem: T::ELEM,
                counter: counter.to_string(),
                max_len,
                rows: byte_rows,
            },
        });
        self
    }

    /// A container column holding opaque aggregates of the externally-defined
    /// type `type_name`.
    pub fn container<T: Any + Send + Sync>(
        mut self,
        name: &str,
        type_name: &str,
        values: Vec<T>,
    ) -> Self {
        let rows = values
            .into_iter()
            .map(|v| Arc::new(v) as ContainerRef)
            .collect();
        self.columns.push(MemoryColumn {
            name: name.to_string(),
            data: ColumnRows::Container {
                type_name: type_name.to_string(),
                rows,
            },
        });
        self
    }

    pub fn build(self) -> Result<MemoryTable, PivotError> {
        let rows = self.columns.first().map_or(0, MemoryColumn::row_count);
        for col in &self.columns {
            if col.row_count() != rows {
                return Err(PivotError::SourceError(format!(
                    "column '{}' has {} rows, expected {}",
                    col.name,
                    col.row_count(),
                    rows
                )));
            }
        }
        self.validate_counters()?;
        Ok(MemoryTable {
            name: self.name,
            columns: self.columns,
            rows: rows as u64,
        })
    }

    /// Every variable column's counter must exist as an `i32` scalar column
    /// whose per-row values equal the stored row lengths.
    fn validate_counters(&self) -> Result<(), PivotError> {
        for col in &self.columns {
            let ColumnRows::Variable { elem, counter, rows, .. } = &col.data else {
                continue;
            };
            let counter_col = self
                .columns
                .iter()
                .find(|c| &c.name == counter)
                .ok_or_else(|| {
                    PivotError::SourceError(format!(
                        "variable column '{}' references missing counter '{counter}'",
                        col.name
                    ))
                })?;
            let ColumnRows::Flat { elem: ElementType::Int32, len: 1, bytes } = &counter_col.data
            else {
                return Err(PivotError::SourceError(format!(
                    "counter column '{counter}' must be an i32 scalar"
                )));
            };
            let elem_size = elem.size_in_bytes();
            for (row, row_bytes) in rows.iter().enumerate() {
                let declared =
                    bytemuck::try_pod_read_unaligned::<i32>(&bytes[row * 4..row * 4 + 4])?;
                if declared as usize != row_bytes.len() / elem_size {
                    return Err(PivotError::SourceError(format!(
                        "counter '{counter}' declares {declared} elements at row {row}, \
                         but column '{}' stores {}",
                        col.name,
                        row_bytes.len() / elem_size
                    )));
                }
            }
        }
        Ok(())
    }
}

//==================================================================================
// 3. SourceTable implementation
//==================================================================================

impl SourceTable for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> Vec<SourceColumn> {
        self.columns
            .iter()
            .map(|col| SourceColumn {
                name: col.name.clone(),
                storage: match &col.data {
                    ColumnRows::Flat { elem, len, .. } => ColumnStorage::Leaf {
                        elem: *elem,
                        static_len: *len,
                        counter: None,
                    },
                    ColumnRows::Variable { elem, counter, max_len, .. } => ColumnStorage::Leaf {
                        elem: *elem,
                        static_len: 1,
                        counter: Some(CounterRef {
                            name: counter.clone(),
                            max_len: *max_len,
                        }),
                    },
                    ColumnRows::Container { type_name, .. } => ColumnStorage::Aggregate {
                        type_name: type_name.clone(),
                    },
                },
            })
            .collect()
    }

    fn row_count(&self) -> u64 {
        self.rows
    }

    fn read_row(&mut self, row: u64, slots: &mut RowSlots<'_>) -> Result<(), PivotError> {
        if row >= self.rows {
            return Err(PivotError::SourceError(format!(
                "row {row} out of range ({} rows)",
                self.rows
            )));
        }
        let row = row as usize;
        for (name, slot) in slots.iter_mut() {
            let col = self
                .columns
                .iter()
                .find(|c| c.name == name)
                .ok_or_else(|| {
                    PivotError::SourceError(format!("no column '{name}' bound for reading"))
                })?;
            match (&col.data, slot) {
                (ColumnRows::Flat { elem, len, bytes }, SlotMut::Bytes(buf)) => {
                    let width = elem.size_in_bytes() * len;
                    if buf.len() != width {
                        return Err(PivotError::SourceError(format!(
                            "column '{name}': bound buffer is {} bytes, row width is {width}",
                            buf.len()
                        )));
                    }
                    buf.copy_from_slice(&bytes[row * width..(row + 1) * width]);
                }
                (ColumnRows::Variable { rows, .. }, SlotMut::Bytes(buf)) => {
                    let value = &rows[row];
                    if value.len() > buf.len() {
                        return Err(PivotError::SourceError(format!(
                            "column '{name}': row {row} holds {} bytes, buffer capacity is {}",
                            value.len(),
                            buf.len()
                        )));
                    }
                    // Only the actual-length prefix is written; the tail
                    // keeps whatever a previous (longer) row left behind.
                    buf[..value.len()].copy_from_slice(value);
                }
                (ColumnRows::Container { rows, .. }, SlotMut::Container(slot)) => {
                    **slot = Some(rows[row].clone());
                }
                _ => {
                    return Err(PivotError::SourceError(format!(
                        "column '{name}': bound slot kind does not match the column storage"
                    )));
                }
            }
        }
        Ok(())
    }

    fn variable_len(&self, row: u64, column: &str) -> Result<usize, PivotError> {
        let col = self.column(column).ok_or_else(|| {
            PivotError::SourceError(format!("no column '{column}' in table '{}'", self.name))
        })?;
        let ColumnRows::Variable { elem, rows, .. } = &col.data else {
            return Err(PivotError::SourceError(format!(
                "column '{column}' is not variable-length"
            )));
        };
        let value = rows.get(row as usize).ok_or_else(|| {
            PivotError::SourceError(format!("row {row} out of range ({} rows)", rows.len()))
        })?;
        Ok(value.len() / elem.size_in_bytes())
    }
}

//==================================================================================
// 4. MemoryDataset
//==================================================================================

/// A set of named in-memory tables, the analogue of the source location.
#[derive(Default)]
pub struct MemoryDataset {
    tables: Vec<MemoryTable>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: MemoryTable) {
        self.tables.push(table);
    }

    /// Resolves a table by identifier; `None` resolves the first table in the
    /// dataset (the useful behavior when the dataset holds exactly one).
    pub fn table_mut(&mut self, name: Option<&str>) -> Result<&mut MemoryTable, PivotError> {
        match name {
            None => self
                .tables
                .first_mut()
                .ok_or_else(|| PivotError::SourceError("the source dataset is empty".to_string())),
            Some(name) => self
                .tables
                .iter_mut()
                .find(|t| t.name == name)
                .ok_or_else(|| {
                    PivotError::SourceError(format!(
                        "table '{name}' not found in the source dataset"
                    ))
                }),
        }
    }
}

//==================================================================================
// 5. Unit tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_mismatched_row_counts() {
        let err = MemoryTable::builder("t")
            .scalar::<i32>("a", &[1, 2, 3])
            .scalar::<f64>("b", &[1.0])
            .build()
            .unwrap_err();
        assert!(matches!(err, PivotError::SourceError(_)), "{err}");
    }

    #[test]
    fn builder_rejects_counter_mismatch() {
        let err = MemoryTable::builder("t")
            .scalar::<i32>("n", &[2, 1])
            .variable::<f64>("v", "n", &[vec![1.0, 2.0], vec![3.0, 4.0]])
            .build()
            .unwrap_err();
        assert!(matches!(err, PivotError::SourceError(_)), "{err}");
    }

    #[test]
    fn builder_rejects_missing_counter() {
        let err = MemoryTable::builder("t")
            .variable::<f64>("v", "n", &[vec![1.0]])
            .build()
            .unwrap_err();
        assert!(matches!(err, PivotError::SourceError(_)), "{err}");
    }

    #[test]
    fn variable_read_leaves_the_slot_tail_untouched() {
        let mut table = MemoryTable::builder("t")
            .scalar::<i32>("n", &[3, 1])
            .variable::<u8>("v", "n", &[vec![1, 2, 3], vec![9]])
            .build()
            .unwrap();

        let mut buf = vec![0xAA_u8; 3];
        let mut slots = RowSlots::new(vec![("v", SlotMut::Bytes(&mut buf))]);
        table.read_row(1, &mut slots).unwrap();
        drop(slots);

        // Row 1 has one element; the other two bytes keep their old content.
        assert_eq!(buf, vec![9, 0xAA, 0xAA]);
        assert_eq!(table.variable_len(1, "v").unwrap(), 1);
    }

    #[test]
    fn counter_maximum_is_derived_from_the_data() {
        let table = MemoryTable::builder("t")
            .scalar::<i32>("n", &[2, 0, 5])
            .variable::<f64>(
                "z",
                "n",
                &[vec![1.0, 2.0], vec![], vec![3.0, 4.0, 5.0, 6.0, 7.0]],
            )
            .build()
            .unwrap();
        let columns = table.columns();
        let z = columns.iter().find(|c| c.name == "z").unwrap();
        match &z.storage {
            ColumnStorage::Leaf { counter: Some(counter), .. } => {
                assert_eq!(counter.name, "n");
                assert_eq!(counter.max_len, 5);
            }
            other => panic!("unexpected storage: {other:?}"),
        }
    }

    #[test]
    fn dataset_resolves_first_table_and_reports_missing_names() {
        let mut dataset = MemoryDataset::new();
        assert!(dataset.table_mut(None).is_err());

        dataset.insert(MemoryTable::builder("events").scalar::<i32>("a", &[1]).build().unwrap());
        assert_eq!(dataset.table_mut(None).unwrap().name(), "events");
        assert!(dataset.table_mut(Some("events")).is_ok());

        let err = dataset.table_mut(Some("missing")).unwrap_err();
        assert!(matches!(err, PivotError::SourceError(_)), "{err}");
    }
}
