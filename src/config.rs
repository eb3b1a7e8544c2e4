//! The single source of truth for all rowpivot conversion configuration.
//!
//! This module defines the unified `PivotConfig` struct, which is designed to
//! be created once at the application boundary (e.g., from a user's config
//! file or a driver's argument parser) and then passed into the `Converter`.
//!
//! Global, process-wide toggles (compression defaults, multithreaded source
//! I/O) are explicit fields here rather than ambient process state.

use serde::{Deserialize, Serialize};

use crate::error::PivotError;

//==================================================================================
// I. Compression
//==================================================================================

/// The compression algorithm shorthand accepted by the conversion facade.
///
/// The engine never interprets the algorithm; it encodes it into an opaque
/// integer setting (`algo_code * 100 + level`) and hands that to the target
/// store untouched.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompressionAlgo {
    #[default]
    None,
    Zlib,
    Lzma,
    Lz4,
    Zstd,
}

impl CompressionAlgo {
    fn code(&self) -> i32 {
        match self {
            Self::None => 0,
            Self::Zlib => 1,
            Self::Lzma => 2,
            Self::Lz4 => 4,
            Self::Zstd => 5,
        }
    }

    /// The level used when the shorthand alone is given.
    fn default_level(&self) -> i32 {
        match self {
            Self::None => 0,
            Self::Zlib => 1,
            Self::Lzma => 7,
            Self::Lz4 => 4,
            Self::Zstd => 5,
        }
    }
}

/// A fully-specified compression setting: algorithm plus level.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Compression {
    pub algo: CompressionAlgo,
    pub level: i32,
}

impl Compression {
    /// Parses a shorthand name (`none`, `zlib`, `lzma`, `lz4`, `zstd`) at its
    /// default level. An unknown name is a configuration error.
    pub fn from_shorthand(name: &str) -> Result<Self, PivotError> {
        let algo = match name {
            "none" => CompressionAlgo::None,
            "zlib" => CompressionAlgo::Zlib,
            "lzma" => CompressionAlgo::Lzma,
            "lz4" => CompressionAlgo::Lz4,
            "zstd" => CompressionAlgo::Zstd,
            other => {
                return Err(PivotError::ConfigError(format!(
                    "unknown compression algorithm '{other}'"
                )))
            }
        };
        Ok(Self { algo, level: algo.default_level() })
    }

    /// Parses a shorthand name with an explicit level. Levels run 1..=9 for
    /// every real algorithm; `none` ignores the level.
    pub fn with_level(name: &str, level: i32) -> Result<Self, PivotError> {
        let mut setting = Self::from_shorthand(name)?;
        if setting.algo == CompressionAlgo::None {
            return Ok(setting);
        }
        if !(1..=9).contains(&level) {
            return Err(PivotError::ConfigError(format!(
                "compression level {level} out of range 1..=9"
            )));
        }
        setting.level = level;
        Ok(setting)
    }

    /// The opaque integer handed to the target store: `algo_code * 100 + level`
    /// (e.g. zstd at level 5 -> 505), 0 for no compression.
    pub fn setting(&self) -> i32 {
        if self.algo == CompressionAlgo::None {
            0
        } else {
            self.algo.code() * 100 + self.level
        }
    }
}

//==================================================================================
// II. The unified PivotConfig
//==================================================================================

/// The single, unified configuration for one conversion. Created once and
/// handed to the `Converter`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "snake_case")]
pub struct PivotConfig {
    /// The source table identifier. `None` lets the dataset resolve its first
    /// table (works only when the dataset holds exactly one).
    #[serde(default)]
    pub table: Option<String>,

    /// The compression setting passed opaquely to the target store.
    #[serde(default)]
    pub compression: Compression,

    /// Explicit column projection, matched against sanitized target names.
    /// Empty means all columns.
    #[serde(default)]
    pub columns: Vec<String>,

    /// Names of externally-defined container types to resolve up front.
    /// Each must resolve through the registry or the conversion fails before
    /// any output is produced.
    #[serde(default)]
    pub dictionaries: Vec<String>,

    /// Hint forwarded to the source table's engine. Never changes the single
    /// logical stream of row commits.
    #[serde(default)]
    pub multithreaded_io: bool,
}

impl PivotConfig {
    /// Validates boundary input before any I/O happens.
    pub fn validate(&self) -> Result<(), PivotError> {
        if let Some(table) = &self.table {
            if table.is_empty() {
                return Err(PivotError::ConfigError(
                    "table identifier must not be empty".to_string(),
                ));
            }
        }
        if self.columns.iter().any(|c| c.is_empty()) {
            return Err(PivotError::ConfigError(
                "column projection entries must not be empty".to_string(),
            ));
        }
        if self.dictionaries.iter().any(|d| d.is_empty()) {
            return Err(PivotError::ConfigError(
                "dictionary names must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

//==================================================================================
// III. Unit tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthand_settings_match_the_known_codes() {
        assert_eq!(Compression::from_shorthand("none").unwrap().setting(), 0);
        assert_eq!(Compression::from_shorthand("zlib").unwrap().setting(), 101);
        assert_eq!(Compression::from_shorthand("lzma").unwrap().setting(), 207);
        assert_eq!(Compression::from_shorthand("lz4").unwrap().setting(), 404);
        assert_eq!(Compression::from_shorthand("zstd").unwrap().setting(), 505);
    }

    #[test]
    fn explicit_level_overrides_the_default() {
        assert_eq!(Compression::with_level("lzma", 9).unwrap().setting(), 209);
        assert_eq!(Compression::with_level("zstd", 1).unwrap().setting(), 501);
        // `none` has no meaningful level.
        assert_eq!(Compression::with_level("none", 9).unwrap().setting(), 0);
    }

    #[test]
    fn unknown_shorthand_is_a_config_error() {
        let err = Compression::from_shorthand("snappy").unwrap_err();
        assert!(matches!(err, PivotError::ConfigError(_)), "{err}");
    }

    #[test]
    fn out_of_range_level_is_a_config_error() {
        assert!(Compression::with_level("zstd", 0).is_err());
        assert!(Compression::with_level("zstd", 10).is_err());
    }

    #[test]
    fn validate_rejects_empty_parameters() {
        let mut config = PivotConfig::default();
        assert!(config.validate().is_ok());

        config.table = Some(String::new());
        assert!(config.validate().is_err());
        config.table = None;

        config.columns = vec!["x".to_string(), String::new()];
        assert!(config.validate().is_err());
        config.columns.clear();

        config.dictionaries = vec![String::new()];
        assert!(config.validate().is_err());
    }
}
