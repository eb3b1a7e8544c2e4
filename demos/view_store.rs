//! Prints the footer of a file-backed store: table name, schema, row count,
//! and the page manifest.
//!
//! Usage: `cargo run --example view_store <store-path>`

use rowpivot::target::file;
use rowpivot::PivotError;

fn main() -> Result<(), PivotError> {
    env_logger::init();

    let path = std::env::args().nth(1).ok_or_else(|| {
        PivotError::ConfigError("usage: view_store <store-path>".to_string())
    })?;

    let footer = file::read_footer(&path)?;
    println!("table:   {}", footer.table_name);
    println!("rows:    {}", footer.total_rows);
    println!("writer:  v{}", footer.writer_version);
    println!("schema:");
    for field in &footer.fields {
        println!("  {}: {}", field.name, field.spec);
    }
    println!("pages:");
    for entry in &footer.page_manifest {
        println!(
            "  column {} {:?} {:?}: {} -> {} bytes at offset {}",
            entry.column_idx,
            entry.kind,
            entry.codec,
            entry.uncompressed_size,
            entry.compressed_size,
            entry.offset_in_file
        );
    }
    Ok(())
}
