//! Generates a mixed source table, converts it into a file-backed columnar
//! store with zstd compression, and prints the result.
//!
//! Usage: `cargo run --example convert_table [output-path]`

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rowpivot::progress;
use rowpivot::registry::{StaticRegistry, TypeRegistry};
use rowpivot::source::{MemoryDataset, MemoryTable};
use rowpivot::target::{arrow_impl, ColumnStore, FileStore};
use rowpivot::{Compression, Converter, PivotConfig, PivotError};

#[derive(Debug)]
struct SimpleEvent {
    int_field: i64,
    vec_double: Vec<f64>,
}

fn generated_table(rows: usize) -> Result<MemoryTable, PivotError> {
    let mut rng = StdRng::seed_from_u64(7);

    let x: Vec<f32> = (0..rows * 3).map(|_| rng.random::<f32>()).collect();
    let z: Vec<Vec<f64>> = (0..rows)
        .map(|_| {
            let len = rng.random_range(0..=8);
            (0..len).map(|_| rng.random_range(-1.0..1.0)).collect()
        })
        .collect();
    let nz: Vec<i32> = z.iter().map(|row| row.len() as i32).collect();
    let events: Vec<SimpleEvent> = (0..rows)
        .map(|i| SimpleEvent {
            int_field: i as i64,
            vec_double: vec![i as f64; 2],
        })
        .collect();

    MemoryTable::builder("MixedTree")
        .fixed::<f32>("x", 3, &x)
        .scalar::<i32>("nz", &nz)
        .variable::<f64>("z", "nz", &z)
        .container("event", "SimpleEvent", events)
        .build()
}

fn main() -> Result<(), PivotError> {
    env_logger::init();

    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "out.rpvt".to_string());
    let rows = 50_000;

    let mut dataset = MemoryDataset::new();
    dataset.insert(generated_table(rows)?);

    let mut registry = StaticRegistry::new();
    registry.register::<SimpleEvent>("SimpleEvent");
    let registry: Arc<dyn TypeRegistry> = Arc::new(registry);

    // In-memory conversion of the full table, container column included.
    let config = PivotConfig {
        table: Some("MixedTree".to_string()),
        compression: Compression::from_shorthand("zstd")?,
        ..PivotConfig::default()
    };
    let mut conversion = Converter::new(config.clone())?
        .with_registry(Arc::clone(&registry))
        .with_progress(progress::print_percent());

    let mut store = ColumnStore::new();
    let table = dataset.table_mut(config.table.as_deref())?;
    let summary = conversion.convert(table, &mut store)?;
    println!("converted {} rows x {} columns", summary.rows, summary.columns);
    println!("row 13: {}", store.row_json(13)?);

    let event = store
        .container_value("event", 13)?
        .downcast_ref::<SimpleEvent>()
        .ok_or_else(|| PivotError::InternalError("unexpected container type".to_string()))?;
    println!("event 13: {event:?}");

    let batch = arrow_impl::to_record_batch(&store)?;
    println!(
        "arrow export: {} columns x {} rows",
        batch.num_columns(),
        batch.num_rows()
    );

    // File-backed conversion of the leaf columns.
    let file_config = PivotConfig {
        columns: vec!["x".to_string(), "nz".to_string(), "z".to_string()],
        ..config
    };
    let mut file_conversion = Converter::new(file_config)?
        .with_registry(registry)
        .with_progress(progress::print_percent());
    let mut file_store = FileStore::create(&output, "MixedTree");
    let table = dataset.table_mut(Some("MixedTree"))?;
    file_conversion.convert(table, &mut file_store)?;
    println!("wrote {output}");

    Ok(())
}
