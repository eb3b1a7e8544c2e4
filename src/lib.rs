//! This file is the root of the `rowpivot` Rust crate.
//!
//! rowpivot converts a row-oriented, schema-described record store (a source
//! table) into a columnar, schema-described record store (a target store),
//! preserving per-row values exactly while reorganizing them by column. The
//! engine classifies each source column by storage shape, derives a matching
//! target column type, binds memory buffers between source and target, and
//! streams every row through that binding.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//==================================================================================
// 1. Module Declarations
//==================================================================================
pub mod classify;
pub mod config;
pub mod convert;
pub mod error;
pub mod progress;
pub mod registry;
pub mod row;
pub mod schema;
pub mod source;
pub mod target;
pub mod types;

mod bind;
mod transfer;

#[cfg(test)]
mod convert_tests;

//==================================================================================
// 2. Public API Re-exports
//==================================================================================
pub use config::{Compression, CompressionAlgo, PivotConfig};
pub use convert::{ConvertPhase, ConvertSummary, Converter};
pub use error::PivotError;
pub use transfer::ProgressFn;
