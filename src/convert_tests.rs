//! End-to-end conversion tests: a mixed source table (fixed array, counter,
//! variable column, opaque container) streamed through the full facade into
//! the built-in target stores.

use std::sync::{Arc, Mutex};

use crate::config::{Compression, PivotConfig};
use crate::convert::{ConvertPhase, Converter};
use crate::error::PivotError;
use crate::registry::{StaticRegistry, TypeRegistry};
use crate::source::{MemoryDataset, MemoryTable, SourceTable};
use crate::target::{file, ColumnStore, FileStore};

/// The externally-typed aggregate used by container columns, standing in for
/// a dictionary-loaded class.
#[derive(Debug, Clone, PartialEq)]
struct SimpleEvent {
    int_field: i64,
    float_field: f32,
    vec_double: Vec<f64>,
}

fn test_registry() -> Arc<dyn TypeRegistry> {
    let mut registry = StaticRegistry::new();
    registry.register::<SimpleEvent>("SimpleEvent");
    Arc::new(registry)
}

/// The concrete scenario table: `x:[3]f32`, counter `nz`, `z:vec<f64>` with
/// per-row lengths `[2, 0, 5]`, and a container column `obj` whose integer
/// field equals the row index.
fn mixed_table() -> MemoryTable {
    let events: Vec<SimpleEvent> = (0..3)
        .map(|i| SimpleEvent {
            int_field: i as i64,
            float_field: i as f32 * 10.0,
            vec_double: (0..i).map(|j| j as f64).collect(),
        })
        .collect();
    MemoryTable::builder("MixedTree")
        .fixed::<f32>("x", 3, &[0.0, 0.1, 0.2, 1.0, 1.1, 1.2, 2.0, 2.1, 2.2])
        .scalar::<i32>("nz", &[2, 0, 5])
        .variable::<f64>(
            "z",
            "nz",
            &[vec![10.0, 11.0], vec![], vec![20.0, 21.0, 22.0, 23.0, 24.0]],
        )
        .container("obj", "SimpleEvent", events)
        .build()
        .unwrap()
}

fn converter(config: PivotConfig) -> Converter {
    Converter::new(config).unwrap().with_registry(test_registry())
}

#[test]
fn mixed_conversion_preserves_every_value() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut table = mixed_table();
    let mut store = ColumnStore::new();
    let mut conversion = converter(PivotConfig::default());

    let summary = conversion.convert(&mut table, &mut store).unwrap();
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.columns, 4);
    assert_eq!(conversion.phase(), ConvertPhase::Complete);

    // Row-count preservation.
    assert_eq!(store.row_count(), 3);

    // Fixed/flat fidelity, every element of every row.
    assert_eq!(store.fixed_values::<f32>("x", 0).unwrap(), vec![0.0, 0.1, 0.2]);
    assert_eq!(store.fixed_values::<f32>("x", 1).unwrap(), vec![1.0, 1.1, 1.2]);
    assert_eq!(store.fixed_values::<f32>("x", 2).unwrap(), vec![2.0, 2.1, 2.2]);
    assert_eq!(store.scalar_values::<i32>("nz").unwrap(), vec![2, 0, 5]);

    // Variable-length fidelity: actual lengths, not the maximum.
    assert_eq!(store.sequence_values::<f64>("z", 0).unwrap(), vec![10.0, 11.0]);
    // Row 1 is an empty sequence, not absent.
    assert!(store.sequence_values::<f64>("z", 1).unwrap().is_empty());
    assert_eq!(
        store.sequence_values::<f64>("z", 2).unwrap(),
        vec![20.0, 21.0, 22.0, 23.0, 24.0]
    );

    // Container pass-through: the committed instance is the source instance.
    for row in 0..3_u64 {
        let event = store
            .container_value("obj", row)
            .unwrap()
            .downcast_ref::<SimpleEvent>()
            .unwrap();
        assert_eq!(event.int_field, row as i64);
        assert_eq!(event.float_field, row as f32 * 10.0);
        assert_eq!(event.vec_double.len(), row as usize);
    }
}

#[test]
fn projection_keeps_exactly_the_selected_columns() {
    let mut table = mixed_table();
    let mut store = ColumnStore::new();
    let config = PivotConfig {
        columns: vec!["obj".to_string(), "x".to_string()],
        ..PivotConfig::default()
    };
    converter(config).convert(&mut table, &mut store).unwrap();

    // Source order wins, not selection order.
    assert_eq!(store.column_names(), vec!["x".to_string(), "obj".to_string()]);
    assert_eq!(store.row_count(), 3);
}

#[test]
fn empty_projection_means_all_columns() {
    let mut table = mixed_table();
    let mut store = ColumnStore::new();
    converter(PivotConfig::default())
        .convert(&mut table, &mut store)
        .unwrap();
    assert_eq!(
        store.column_names(),
        vec!["x".to_string(), "nz".to_string(), "z".to_string(), "obj".to_string()]
    );
}

#[test]
fn selection_matching_nothing_yields_an_empty_schema() {
    let mut table = mixed_table();
    let mut store = ColumnStore::new();
    let config = PivotConfig {
        columns: vec!["no_such_column".to_string()],
        ..PivotConfig::default()
    };
    let summary = converter(config).convert(&mut table, &mut store).unwrap();

    // "Select nothing" is accepted: all rows stream through zero columns.
    assert_eq!(summary.columns, 0);
    assert!(store.column_names().is_empty());
    assert_eq!(store.row_count(), 3);
}

#[test]
fn dotted_source_names_are_sanitized_in_the_target() {
    let mut table = MemoryTable::builder("t")
        .scalar::<f64>("pos.x", &[1.0, 2.0])
        .scalar::<f64>("pos.y", &[3.0, 4.0])
        .build()
        .unwrap();
    let mut store = ColumnStore::new();
    Converter::new(PivotConfig::default())
        .unwrap()
        .convert(&mut table, &mut store)
        .unwrap();
    assert_eq!(store.column_names(), vec!["pos__x".to_string(), "pos__y".to_string()]);
    assert_eq!(store.scalar_values::<f64>("pos__x").unwrap(), vec![1.0, 2.0]);
}

#[test]
fn empty_table_converts_to_an_empty_store_with_the_schema() {
    let mut table = MemoryTable::builder("t")
        .scalar::<i32>("a", &[])
        .build()
        .unwrap();
    let mut store = ColumnStore::new();
    let summary = Converter::new(PivotConfig::default())
        .unwrap()
        .convert(&mut table, &mut store)
        .unwrap();

    assert_eq!(summary.rows, 0);
    assert_eq!(store.row_count(), 0);
    assert_eq!(store.column_names(), vec!["a".to_string()]);
    assert!(store.is_finalized());
}

#[test]
fn unresolved_container_type_fails_before_any_schema_is_committed() {
    let mut table = mixed_table();
    let mut store = ColumnStore::new();
    // A registry that does not know 'SimpleEvent'.
    let empty_registry: Arc<dyn TypeRegistry> = Arc::new(StaticRegistry::new());
    let mut conversion = Converter::new(PivotConfig::default())
        .unwrap()
        .with_registry(empty_registry);

    let err = conversion.convert(&mut table, &mut store).unwrap_err();
    assert!(matches!(err, PivotError::ResolutionError(_)), "{err}");

    // The target never saw the container column, or any column at all.
    assert!(store.column_names().is_empty());
    assert_eq!(store.row_count(), 0);
    assert_eq!(conversion.phase(), ConvertPhase::Idle);
}

#[test]
fn container_columns_without_a_registry_are_a_resolution_error() {
    let mut table = mixed_table();
    let mut store = ColumnStore::new();
    let err = Converter::new(PivotConfig::default())
        .unwrap()
        .convert(&mut table, &mut store)
        .unwrap_err();
    assert!(matches!(err, PivotError::ResolutionError(_)), "{err}");
}

#[test]
fn dictionary_names_are_resolved_up_front() {
    let mut table = MemoryTable::builder("t")
        .scalar::<i32>("a", &[1])
        .build()
        .unwrap();
    let mut store = ColumnStore::new();
    let config = PivotConfig {
        dictionaries: vec!["NotLoaded".to_string()],
        ..PivotConfig::default()
    };
    // No container columns, but the configured dictionary still must resolve.
    let err = converter(config).convert(&mut table, &mut store).unwrap_err();
    assert!(matches!(err, PivotError::ResolutionError(_)), "{err}");
    assert!(store.column_names().is_empty());
}

#[test]
fn progress_reports_every_committed_row() {
    let mut table = mixed_table();
    let mut store = ColumnStore::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut conversion = converter(PivotConfig::default()).with_progress(Box::new(
        move |done, total| {
            sink.lock().unwrap().push((done, total));
        },
    ));
    conversion.convert(&mut table, &mut store).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
}

#[test]
fn leaf_columns_convert_into_a_compressed_file_store() {
    let path = std::env::temp_dir().join(format!("rowpivot_e2e_{}", std::process::id()));
    let mut table = mixed_table();
    let mut store = FileStore::create(&path, "MixedTree");
    let config = PivotConfig {
        // The file backend cannot hold the opaque container column.
        columns: vec!["x".to_string(), "nz".to_string(), "z".to_string()],
        compression: Compression::from_shorthand("zstd").unwrap(),
        ..PivotConfig::default()
    };
    converter(config).convert(&mut table, &mut store).unwrap();

    let footer = file::read_footer(&path).unwrap();
    assert_eq!(footer.table_name, "MixedTree");
    assert_eq!(footer.total_rows, 3);
    let names: Vec<&str> = footer.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["x", "nz", "z"]);
    assert!(footer
        .page_manifest
        .iter()
        .all(|p| p.codec == file::PageCodec::Zstd));
    std::fs::remove_file(&path).ok();
}

#[test]
fn container_columns_are_rejected_by_the_file_store_schema() {
    let path = std::env::temp_dir().join(format!("rowpivot_rej_{}", std::process::id()));
    let mut table = mixed_table();
    let mut store = FileStore::create(&path, "MixedTree");
    let err = converter(PivotConfig::default())
        .convert(&mut table, &mut store)
        .unwrap_err();
    assert!(matches!(err, PivotError::SchemaError(_)), "{err}");
    std::fs::remove_file(&path).ok();
}

#[test]
fn dataset_resolves_tables_by_name_or_first() {
    let mut dataset = MemoryDataset::new();
    dataset.insert(mixed_table());

    let mut store = ColumnStore::new();
    let config = PivotConfig {
        table: Some("MixedTree".to_string()),
        ..PivotConfig::default()
    };
    let mut conversion = converter(config);
    let table_name = conversion.config().table.clone();
    let table = dataset.table_mut(table_name.as_deref()).unwrap();
    assert_eq!(table.name(), "MixedTree");
    conversion.convert(table, &mut store).unwrap();
    assert_eq!(store.row_count(), 3);

    let err = dataset.table_mut(Some("Missing")).unwrap_err();
    assert!(matches!(err, PivotError::SourceError(_)), "{err}");
}
