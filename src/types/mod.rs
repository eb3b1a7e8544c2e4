//! This module defines the canonical, type-safe representation of element
//! types and target column types used throughout the rowpivot engine.
//!
//! `ElementType` is the leaf-type tag carried by source columns and column
//! descriptors. `TypeSpec` is the target store's type language: the schema
//! builder renders a `TypeSpec` to its canonical string when constructing a
//! target column, and store backends parse that string back (rejecting
//! anything they cannot represent).

use arrow_schema::DataType as ArrowDataType;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PivotError;

//==================================================================================
// 1. Element types
//==================================================================================

/// The canonical, internal representation of a primitive leaf type.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Boolean,
}

impl ElementType {
    /// The storage width of one element, in bytes. Booleans occupy one byte.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 | Self::Boolean => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    /// The canonical name used in the target type language.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Int8 => "i8",
            Self::Int16 => "i16",
            Self::Int32 => "i32",
            Self::Int64 => "i64",
            Self::UInt8 => "u8",
            Self::UInt16 => "u16",
            Self::UInt32 => "u32",
            Self::UInt64 => "u64",
            Self::Float32 => "f32",
            Self::Float64 => "f64",
            Self::Boolean => "bool",
        }
    }

    /// Parses a canonical element type name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "i8" => Some(Self::Int8),
            "i16" => Some(Self::Int16),
            "i32" => Some(Self::Int32),
            "i64" => Some(Self::Int64),
            "u8" => Some(Self::UInt8),
            "u16" => Some(Self::UInt16),
            "u32" => Some(Self::UInt32),
            "u64" => Some(Self::UInt64),
            "f32" => Some(Self::Float32),
            "f64" => Some(Self::Float64),
            "bool" => Some(Self::Boolean),
            _ => None,
        }
    }

    /// Converts an `ElementType` into the equivalent Arrow `DataType`.
    pub fn to_arrow_type(&self) -> ArrowDataType {
        match self {
            Self::Int8 => ArrowDataType::Int8,
            Self::Int16 => ArrowDataType::Int16,
            Self::Int32 => ArrowDataType::Int32,
            Self::Int64 => ArrowDataType::Int64,
            Self::UInt8 => ArrowDataType::UInt8,
            Self::UInt16 => ArrowDataType::UInt16,
            Self::UInt32 => ArrowDataType::UInt32,
            Self::UInt64 => ArrowDataType::UInt64,
            Self::Float32 => ArrowDataType::Float32,
            Self::Float64 => ArrowDataType::Float64,
            Self::Boolean => ArrowDataType::Boolean,
        }
    }

    /// Returns `true` if the type is a signed or unsigned integer.
    pub fn is_integer(&self) -> bool {
        !matches!(self, Self::Float32 | Self::Float64 | Self::Boolean)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Links a Rust primitive to its `ElementType` tag. Implemented for every
/// plain-old-data leaf type a source column can carry.
pub trait Element: bytemuck::Pod {
    const ELEM: ElementType;
}

macro_rules! impl_element {
    ($T:ty, $tag:expr) => {
        impl Element for $T {
            const ELEM: ElementType = $tag;
        }
    };
}

impl_element!(i8, ElementType::Int8);
impl_element!(i16, ElementType::Int16);
impl_element!(i32, ElementType::Int32);
impl_element!(i64, ElementType::Int64);
impl_element!(u8, ElementType::UInt8);
impl_element!(u16, ElementType::UInt16);
impl_element!(u32, ElementType::UInt32);
impl_element!(u64, ElementType::UInt64);
impl_element!(f32, ElementType::Float32);
impl_element!(f64, ElementType::Float64);

//==================================================================================
// 2. The target type language
//==================================================================================

/// A target column type, as understood by target stores.
///
/// The canonical string forms are part of the public contract:
///
/// - scalar:          `f64`
/// - fixed array:     `[f32; 3]`
/// - sequence:        `vec<f64; 5>` (the number is a capacity hint, the
///   declared maximum per-row length)
/// - named container: the externally-resolved type name, verbatim
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeSpec {
    Scalar { elem: ElementType },
    FixedArray { elem: ElementType, len: usize },
    Sequence { elem: ElementType, max_len: usize },
    Named { name: String },
}

impl TypeSpec {
    /// Parses a canonical type string. Anything that is neither a recognized
    /// leaf/array/sequence form nor a plausible type identifier is rejected.
    pub fn parse(spec: &str) -> Result<Self, PivotError> {
        let spec = spec.trim();
        if let Some(inner) = spec.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            let (elem, len) = split_elem_and_count(inner, spec)?;
            if len == 0 {
                return Err(PivotError::UnsupportedType(format!(
                    "fixed array length must be >= 1 in '{spec}'"
                )));
            }
            return Ok(Self::FixedArray { elem, len });
        }
        if let Some(inner) = spec.strip_prefix("vec<").and_then(|s| s.strip_suffix('>')) {
            let (elem, max_len) = split_elem_and_count(inner, spec)?;
            return Ok(Self::Sequence { elem, max_len });
        }
        if let Some(elem) = ElementType::from_name(spec) {
            return Ok(Self::Scalar { elem });
        }
        if is_type_identifier(spec) {
            return Ok(Self::Named {
                name: spec.to_string(),
            });
        }
        Err(PivotError::UnsupportedType(format!(
            "cannot parse type string '{spec}'"
        )))
    }

    /// The element type of a leaf-backed spec; `None` for named containers.
    pub fn elem(&self) -> Option<ElementType> {
        match self {
            Self::Scalar { elem }
            | Self::FixedArray { elem, .. }
            | Self::Sequence { elem, .. } => Some(*elem),
            Self::Named { .. } => None,
        }
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar { elem } => write!(f, "{elem}"),
            Self::FixedArray { elem, len } => write!(f, "[{elem}; {len}]"),
            Self::Sequence { elem, max_len } => write!(f, "vec<{elem}; {max_len}>"),
            Self::Named { name } => f.write_str(name),
        }
    }
}

/// Splits `"f64; 5"` into its element type and count.
fn split_elem_and_count(inner: &str, whole: &str) -> Result<(ElementType, usize), PivotError> {
    let (elem_str, count_str) = inner.split_once(';').ok_or_else(|| {
        PivotError::UnsupportedType(format!("missing '; <count>' in '{whole}'"))
    })?;
    let elem = ElementType::from_name(elem_str.trim()).ok_or_else(|| {
        PivotError::UnsupportedType(format!("unknown element type in '{whole}'"))
    })?;
    let count = count_str.trim().parse::<usize>().map_err(|_| {
        PivotError::UnsupportedType(format!("invalid count in '{whole}'"))
    })?;
    Ok((elem, count))
}

/// A plausible externally-defined type name: identifier characters plus `::`
/// path separators, not starting with a digit.
fn is_type_identifier(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with(|c: char| c.is_ascii_digit())
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

//==================================================================================
// 3. Unit tests
//==================================================================================
