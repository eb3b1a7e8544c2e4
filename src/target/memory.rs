//! The in-memory columnar store: the reference `TargetStore` backend.
//!
//! Committed rows are reorganized column-wise into contiguous byte buffers
//! (plus offsets for sequences, plus shared handles for containers). Typed
//! read-back accessors make conversion results directly checkable, and
//! `row_json` renders one row the way the original viewer does.

use hashbrown::HashMap;
use num_traits::ToPrimitive;
use serde_json::Value;

use crate::error::PivotError;
use crate::registry::ContainerRef;
use crate::row::{ColumnValue, RowView};
use crate::schema::SchemaField;
use crate::target::TargetStore;
use crate::types::{Element, ElementType, TypeSpec};

//==================================================================================
// 1. Columnar storage
//==================================================================================

enum ColumnData {
    Scalar {
        elem: ElementType,
        bytes: Vec<u8>,
    },
    FixedArray {
        elem: ElementType,
        len: usize,
        bytes: Vec<u8>,
    },
    Sequence {
        elem: ElementType,
        /// Element-count offsets; `offsets[i]..offsets[i+1]` frames row `i`.
        offsets: Vec<usize>,
        bytes: Vec<u8>,
    },
    Container {
        values: Vec<ContainerRef>,
    },
}

struct StoreColumn {
    name: String,
    spec: TypeSpec,
    data: ColumnData,
}

//==================================================================================
// 2. ColumnStore
//==================================================================================

/// An in-memory columnar store.
#[derive(Default)]
pub struct ColumnStore {
    compression: i32,
    columns: Vec<StoreColumn>,
    index: HashMap<String, usize>,
    frozen: bool,
    finalized: bool,
    rows: u64,
}

impl ColumnStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> u64 {
        self.rows
    }

    /// The opaque compression setting the conversion handed over.
    pub fn compression_setting(&self) -> i32 {
        self.compression
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Declared fields, in schema order.
    pub fn fields(&self) -> Vec<SchemaField> {
        self.columns
            .iter()
            .map(|c| SchemaField { name: c.name.clone(), spec: c.spec.clone() })
            .collect()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    fn column(&self, name: &str) -> Result<&StoreColumn, PivotError> {
        self.index
            .get(name)
            .map(|&i| &self.columns[i])
            .ok_or_else(|| PivotError::SchemaError(format!("no column '{name}' in the store")))
    }

    //------------------------------------------------------------------------------
    // Typed read-back accessors
    //------------------------------------------------------------------------------

    /// All scalar values of a column.
    pub fn scalar_values<T: Element>(&self, name: &str) -> Result<Vec<T>, PivotError> {
        match &self.column(name)?.data {
            ColumnData::Scalar { elem, bytes } => {
                check_elem::<T>(name, *elem)?;
                decode_elements(bytes)
            }
            _ => Err(PivotError::SchemaError(format!("column '{name}' is not a scalar"))),
        }
    }

    /// The fixed-length array of one row.
    pub fn fixed_values<T: Element>(&self, name: &str, row: u64) -> Result<Vec<T>, PivotError> {
        match &self.column(name)?.data {
            ColumnData::FixedArray { elem, len, bytes } => {
                check_elem::<T>(name, *elem)?;
                let width = len * elem.size_in_bytes();
                let start = row as usize * width;
                let slice = bytes.get(start..start + width).ok_or_else(|| {
                    PivotError::SchemaError(format!("row {row} out of range in column '{name}'"))
                })?;
                decode_elements(slice)
            }
            _ => Err(PivotError::SchemaError(format!(
                "column '{name}' is not a fixed array"
            ))),
        }
    }

    /// The sequence of one row; its length is the row's actual length.
    pub fn sequence_values<T: Element>(&self, name: &str, row: u64) -> Result<Vec<T>, PivotError> {
        match &self.column(name)?.data {
            ColumnData::Sequence { elem, offsets, bytes } => {
                check_elem::<T>(name, *elem)?;
                let row = row as usize;
                if row + 1 >= offsets.len() {
                    return Err(PivotError::SchemaError(format!(
                        "row {row} out of range in column '{name}'"
                    )));
                }
                let size = elem.size_in_bytes();
                decode_elements(&bytes[offsets[row] * size..offsets[row + 1] * size])
            }
            _ => Err(PivotError::SchemaError(format!(
                "column '{name}' is not a sequence"
            ))),
        }
    }

    /// The container handle committed for one row.
    pub fn container_value(&self, name: &str, row: u64) -> Result<&ContainerRef, PivotError> {
        match &self.column(name)?.data {
            ColumnData::Container { values } => values.get(row as usize).ok_or_else(|| {
                PivotError::SchemaError(format!("row {row} out of range in column '{name}'"))
            }),
            _ => Err(PivotError::SchemaError(format!(
                "column '{name}' is not a container column"
            ))),
        }
    }

    /// All scalar values of a numeric column, widened to `f64`.
    pub fn scalar_values_as_f64(&self, name: &str) -> Result<Vec<f64>, PivotError> {
        match &self.column(name)?.data {
            ColumnData::Scalar { elem, bytes } => elements_as_f64(*elem, bytes),
            _ => Err(PivotError::SchemaError(format!("column '{name}' is not a scalar"))),
        }
    }

    /// The raw pages of one column: packed value bytes plus, for sequences,
    /// the row-framing offsets. Container columns have no byte form.
    pub(crate) fn column_pages(
        &self,
        name: &str,
    ) -> Result<(Vec<u8>, Option<Vec<usize>>), PivotError> {
        match &self.column(name)?.data {
            ColumnData::Scalar { bytes, .. } | ColumnData::FixedArray { bytes, .. } => {
                Ok((bytes.clone(), None))
            }
            ColumnData::Sequence { offsets, bytes, .. } => {
                Ok((bytes.clone(), Some(offsets.clone())))
            }
            ColumnData::Container { .. } => Err(PivotError::SchemaError(format!(
                "column '{name}' holds opaque container values"
            ))),
        }
    }

    //------------------------------------------------------------------------------
    // Row rendering
    //------------------------------------------------------------------------------

    /// Renders one row as a JSON object. Container values are opaque and
    /// appear as their type name.
    pub fn row_json(&self, row: u64) -> Result<Value, PivotError> {
        if row >= self.rows {
            return Err(PivotError::SchemaError(format!(
                "row {row} out of range ({} rows)",
                self.rows
            )));
        }
        let mut object = serde_json::Map::new();
        for column in &self.columns {
            let value = match &column.data {
                ColumnData::Scalar { elem, bytes } => {
                    let size = elem.size_in_bytes();
                    let start = row as usize * size;
                    leaf_json(*elem, &bytes[start..start + size])?
                }
                ColumnData::FixedArray { elem, len, bytes } => {
                    let width = len * elem.size_in_bytes();
                    let start = row as usize * width;
                    slice_json(*elem, &bytes[start..start + width])?
                }
                ColumnData::Sequence { elem, offsets, bytes } => {
                    let size = elem.size_in_bytes();
                    let row = row as usize;
                    slice_json(*elem, &bytes[offsets[row] * size..offsets[row + 1] * size])?
                }
                ColumnData::Container { .. } => {
                    Value::String(format!("<{}>", column.spec))
                }
            };
            object.insert(column.name.clone(), value);
        }
        Ok(Value::Object(object))
    }
}

//==================================================================================
// 3. TargetStore implementation
//==================================================================================

impl TargetStore for ColumnStore {
    fn set_compression(&mut self, setting: i32) {
        self.compression = setting;
    }

    fn add_column(&mut self, name: &str, type_spec: &str) -> Result<(), PivotError> {
        if self.frozen {
            return Err(PivotError::InternalError(format!(
                "attempted to add column '{name}' after the schema was frozen"
            )));
        }
        if self.index.contains_key(name) {
            return Err(PivotError::SchemaError(format!(
                "column '{name}' already exists in the store"
            )));
        }
        let spec = TypeSpec::parse(type_spec)
            .map_err(|e| PivotError::SchemaError(format!("column '{name}': {e}")))?;
        let data = match &spec {
            TypeSpec::Scalar { elem } => ColumnData::Scalar { elem: *elem, bytes: Vec::new() },
            TypeSpec::FixedArray { elem, len } => ColumnData::FixedArray {
                elem: *elem,
                len: *len,
                bytes: Vec::new(),
            },
            TypeSpec::Sequence { elem, max_len } => ColumnData::Sequence {
                elem: *elem,
                offsets: vec![0],
                bytes: Vec::with_capacity(max_len * elem.size_in_bytes()),
            },
            TypeSpec::Named { .. } => ColumnData::Container { values: Vec::new() },
        };
        self.index.insert(name.to_string(), self.columns.len());
        self.columns.push(StoreColumn { name: name.to_string(), spec, data });
        Ok(())
    }

    fn freeze_schema(&mut self) -> Result<(), PivotError> {
        self.frozen = true;
        Ok(())
    }

    fn commit_row(&mut self, row: RowView<'_>) -> Result<(), PivotError> {
        if !self.frozen {
            return Err(PivotError::InternalError(
                "commit_row called before the schema was frozen".to_string(),
            ));
        }
        if self.finalized {
            return Err(PivotError::InternalError(
                "commit_row called on a finalized store".to_string(),
            ));
        }
        for column in &mut self.columns {
            let value = row.get(&column.name).ok_or_else(|| {
                PivotError::SchemaError(format!("committed row misses column '{}'", column.name))
            })?;
            match (&mut column.data, value) {
                (ColumnData::Scalar { elem, bytes }, ColumnValue::Fixed { len: 1, bytes: b, .. })
                    if b.len() == elem.size_in_bytes() =>
                {
                    bytes.extend_from_slice(b);
                }
                (
                    ColumnData::FixedArray { elem, len, bytes },
                    ColumnValue::Fixed { len: value_len, bytes: b, .. },
                ) if *value_len == *len && b.len() == *len * elem.size_in_bytes() => {
                    bytes.extend_from_slice(b);
                }
                (
                    ColumnData::Sequence { elem, offsets, bytes },
                    ColumnValue::Sequence { len, bytes: b, .. },
                ) if b.len() == *len * elem.size_in_bytes() => {
                    offsets.push(offsets.last().copied().unwrap_or(0) + *len);
                    bytes.extend_from_slice(b);
                }
                (ColumnData::Container { values }, ColumnValue::Container(handle)) => {
                    values.push(ContainerRef::clone(handle));
                }
                _ => {
                    return Err(PivotError::SchemaError(format!(
                        "value shape does not match column '{}' ({})",
                        column.name, column.spec
                    )));
                }
            }
        }
        self.rows += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), PivotError> {
        self.finalized = true;
        log::info!(
            "column store finalized: {} columns, {} rows",
            self.columns.len(),
            self.rows
        );
        Ok(())
    }
}

//==================================================================================
// 4. Decoding helpers
//==================================================================================

fn check_elem<T: Element>(name: &str, elem: ElementType) -> Result<(), PivotError> {
    if T::ELEM != elem {
        return Err(PivotError::SchemaError(format!(
            "column '{name}' stores {elem}, requested {}",
            T::ELEM
        )));
    }
    Ok(())
}

/// Decodes a packed byte buffer into owned elements. Buffers have byte
/// alignment, so every element is read unaligned.
fn decode_elements<T: Element>(bytes: &[u8]) -> Result<Vec<T>, PivotError> {
    let size = T::ELEM.size_in_bytes();
    if bytes.len() % size != 0 {
        return Err(PivotError::PodCast(format!(
            "buffer of {} bytes is not a multiple of the element size {size}",
            bytes.len()
        )));
    }
    bytes
        .chunks_exact(size)
        .map(|chunk| bytemuck::try_pod_read_unaligned::<T>(chunk).map_err(Into::into))
        .collect()
}

fn elements_as_f64(elem: ElementType, bytes: &[u8]) -> Result<Vec<f64>, PivotError> {
    fn widen<T: Element + ToPrimitive>(bytes: &[u8]) -> Result<Vec<f64>, PivotError> {
        Ok(decode_elements::<T>(bytes)?
            .into_iter()
            .map(|v| v.to_f64().unwrap_or(f64::NAN))
            .collect())
    }
    match elem {
        ElementType::Int8 => widen::<i8>(bytes),
        ElementType::Int16 => widen::<i16>(bytes),
        ElementType::Int32 => widen::<i32>(bytes),
        ElementType::Int64 => widen::<i64>(bytes),
        ElementType::UInt8 => widen::<u8>(bytes),
        ElementType::UInt16 => widen::<u16>(bytes),
        ElementType::UInt32 => widen::<u32>(bytes),
        ElementType::UInt64 => widen::<u64>(bytes),
        ElementType::Float32 => widen::<f32>(bytes),
        ElementType::Float64 => widen::<f64>(bytes),
        ElementType::Boolean => Ok(bytes.iter().map(|b| f64::from(u8::from(*b != 0))).collect()),
    }
}

/// One element as a JSON value, preserving integer-ness where possible.
fn leaf_json(elem: ElementType, bytes: &[u8]) -> Result<Value, PivotError> {
    let value = match elem {
        ElementType::Int8 => Value::from(bytemuck::try_pod_read_unaligned::<i8>(bytes)?),
        ElementType::Int16 => Value::from(bytemuck::try_pod_read_unaligned::<i16>(bytes)?),
        ElementType::Int32 => Value::from(bytemuck::try_pod_read_unaligned::<i32>(bytes)?),
        ElementType::Int64 => Value::from(bytemuck::try_pod_read_unaligned::<i64>(bytes)?),
        ElementType::UInt8 => Value::from(bytemuck::try_pod_read_unaligned::<u8>(bytes)?),
        ElementType::UInt16 => Value::from(bytemuck::try_pod_read_unaligned::<u16>(bytes)?),
        ElementType::UInt32 => Value::from(bytemuck::try_pod_read_unaligned::<u32>(bytes)?),
        ElementType::UInt64 => Value::from(bytemuck::try_pod_read_unaligned::<u64>(bytes)?),
        ElementType::Float32 => Value::from(bytemuck::try_pod_read_unaligned::<f32>(bytes)?),
        ElementType::Float64 => Value::from(bytemuck::try_pod_read_unaligned::<f64>(bytes)?),
        ElementType::Boolean => Value::from(bytes[0] != 0),
    };
    Ok(value)
}

fn slice_json(elem: ElementType, bytes: &[u8]) -> Result<Value, PivotError> {
    let size = elem.size_in_bytes();
    let values = bytes
        .chunks_exact(size)
        .map(|chunk| leaf_json(elem, chunk))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Array(values))
}

//==================================================================================
// 5. Unit tests
//==================================================================================
