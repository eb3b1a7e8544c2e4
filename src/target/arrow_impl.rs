//! The Arrow boundary: exports the leaf columns of a `ColumnStore` as an
//! Arrow `RecordBatch`.
//!
//! Scalars become primitive arrays, fixed arrays become `FixedSizeList`,
//! sequences become `List`. Container columns have no Arrow representation
//! and are skipped.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, FixedSizeListArray, Float32Array, Float64Array, Int8Array,
    Int16Array, Int32Array, Int64Array, ListArray, UInt8Array, UInt16Array, UInt32Array,
    UInt64Array,
};
use arrow::buffer::OffsetBuffer;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use arrow_schema::{DataType, Field, Schema};

use crate::error::PivotError;
use crate::target::ColumnStore;
use crate::types::{Element, ElementType, TypeSpec};

/// Builds a flat array of leaf values from packed bytes.
fn leaf_array(elem: ElementType, bytes: &[u8]) -> Result<ArrayRef, PivotError> {
    fn decode<T: Element>(bytes: &[u8]) -> Result<Vec<T>, PivotError> {
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

    let array: ArrayRef = match elem {
        ElementType::Int8 => Arc::new(Int8Array::from(decode::<i8>(bytes)?)),
        ElementType::Int16 => Arc::new(Int16Array::from(decode::<i16>(bytes)?)),
        ElementType::Int32 => Arc::new(Int32Array::from(decode::<i32>(bytes)?)),
        ElementType::Int64 => Arc::new(Int64Array::from(decode::<i64>(bytes)?)),
        ElementType::UInt8 => Arc::new(UInt8Array::from(decode::<u8>(bytes)?)),
        ElementType::UInt16 => Arc::new(UInt16Array::from(decode::<u16>(bytes)?)),
        ElementType::UInt32 => Arc::new(UInt32Array::from(decode::<u32>(bytes)?)),
        ElementType::UInt64 => Arc::new(UInt64Array::from(decode::<u64>(bytes)?)),
        ElementType::Float32 => Arc::new(Float32Array::from(decode::<f32>(bytes)?)),
        ElementType::Float64 => Arc::new(Float64Array::from(decode::<f64>(bytes)?)),
        ElementType::Boolean => Arc::new(BooleanArray::from(
            bytes.iter().map(|b| *b != 0).collect::<Vec<bool>>(),
        )),
    };
    Ok(array)
}

fn item_field(elem: ElementType) -> Arc<Field> {
    Arc::new(Field::new("item", elem.to_arrow_type(), false))
}

/// Exports the store's leaf columns as one `RecordBatch`. Container columns
/// are skipped; the batch row count always equals the store row count.
pub fn to_record_batch(store: &ColumnStore) -> Result<RecordBatch, PivotError> {
    let mut fields = Vec::new();
    let mut arrays: Vec<ArrayRef> = Vec::new();

    for schema_field in store.fields() {
        let name = schema_field.name.as_str();
        match &schema_field.spec {
            TypeSpec::Scalar { elem } => {
                let (values, _) = store.column_pages(name)?;
                fields.push(Field::new(name, elem.to_arrow_type(), false));
                arrays.push(leaf_array(*elem, &values)?);
            }
            TypeSpec::FixedArray { elem, len } => {
                let (values, _) = store.column_pages(name)?;
                let child = leaf_array(*elem, &values)?;
                fields.push(Field::new(
                    name,
                    DataType::FixedSizeList(item_field(*elem), *len as i32),
                    false,
                ));
                arrays.push(Arc::new(FixedSizeListArray::new(
                    item_field(*elem),
                    *len as i32,
                    child,
                    None,
                )));
            }
            TypeSpec::Sequence { elem, .. } => {
                let (values, offsets) = store.column_pages(name)?;
                let offsets = offsets.ok_or_else(|| {
                    PivotError::InternalError(format!("sequence column '{name}' has no offsets"))
                })?;
                let child = leaf_array(*elem, &values)?;
                let lengths = offsets.windows(2).map(|w| w[1] - w[0]);
                fields.push(Field::new(name, DataType::List(item_field(*elem)), false));
                arrays.push(Arc::new(ListArray::new(
                    item_field(*elem),
                    OffsetBuffer::from_lengths(lengths),
                    child,
                    None,
                )));
            }
            TypeSpec::Named { .. } => {
                log::debug!("column '{name}' is an opaque container; skipped in Arrow export");
            }
        }
    }

    let schema = Arc::new(Schema::new(fields));
    let options = RecordBatchOptions::new().with_row_count(Some(store.row_count() as usize));
    RecordBatch::try_new_with_options(schema, arrays, &options)
        .map_err(|e| PivotError::InternalError(format!("Arrow export failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::{ColumnValue, RowView};
    use crate::target::TargetStore;
    use arrow::array::Array;

    #[test]
    fn leaf_columns_export_to_a_record_batch() {
        let mut store = ColumnStore::new();
        store.add_column("a", "i64").unwrap();
        store.add_column("x", "[f32; 2]").unwrap();
        store.add_column("z", "vec<f64; 4>").unwrap();
        store.freeze_schema().unwrap();

        for i in 0..3_i64 {
            let a_bytes = i.to_ne_bytes();
            let x = [i as f32, -(i as f32)];
            let x_bytes: Vec<u8> = bytemuck::cast_slice(&x).to_vec();
            let z: Vec<f64> = (0..i as usize).map(|j| j as f64).collect();
            let z_bytes: Vec<u8> = bytemuck::cast_slice(&z).to_vec();
            store
                .commit_row(RowView::new(vec![
                    (
                        "a",
                        ColumnValue::Fixed { elem: ElementType::Int64, len: 1, bytes: &a_bytes },
                    ),
                    (
                        "x",
                        ColumnValue::Fixed { elem: ElementType::Float32, len: 2, bytes: &x_bytes },
                    ),
                    (
                        "z",
                        ColumnValue::Sequence {
                            elem: ElementType::Float64,
                            len: z.len(),
                            bytes: &z_bytes,
                        },
                    ),
                ]))
                .unwrap();
        }
        store.finalize().unwrap();

        let batch = to_record_batch(&store).unwrap();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.num_columns(), 3);

        let a = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(a.values().to_vec(), vec![0, 1, 2]);

        let z = batch
            .column(2)
            .as_any()
            .downcast_ref::<ListArray>()
            .unwrap();
        assert_eq!(z.value(0).len(), 0);
        assert_eq!(z.value(2).len(), 2);
    }

    #[test]
    fn empty_store_exports_an_empty_batch() {
        let mut store = ColumnStore::new();
        store.add_column("a", "i32").unwrap();
        store.freeze_schema().unwrap();
        store.finalize().unwrap();

        let batch = to_record_batch(&store).unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 1);
    }
}
