//! The Column Classifier: inspects the source table's declared columns and
//! classifies each into one of the three storage shapes, resolving element
//! types and declared/maximum lengths.
//!
//! The three-way shape distinction (flat / variable / container) is a closed
//! set: behavior per shape is fully enumerated downstream, so the descriptors
//! are a tagged union, not a trait hierarchy.

use hashbrown::HashSet;

use crate::error::PivotError;
use crate::source::{ColumnStorage, SourceColumn};
use crate::types::{ElementType, TypeSpec};

//==================================================================================
// 1. Column descriptors
//==================================================================================

/// A scalar or fixed-length array column.
#[derive(Debug, Clone)]
pub struct FlatColumn {
    pub source_name: String,
    pub target_name: String,
    pub elem: ElementType,
    pub elem_size: usize,
    /// 1 for scalars, N for fixed arrays.
    pub len: usize,
}

/// A column whose per-row element count varies, framed by a companion length
/// indicator.
#[derive(Debug, Clone)]
pub struct VariableColumn {
    pub source_name: String,
    pub target_name: String,
    pub elem: ElementType,
    pub elem_size: usize,
    /// Declared upper bound of the length indicator; sizes the shared buffer.
    pub max_len: usize,
    /// Source name of the length-indicator column.
    pub counter: String,
}

/// A column holding an externally-typed opaque aggregate.
#[derive(Debug, Clone)]
pub struct ContainerColumn {
    pub source_name: String,
    pub target_name: String,
    pub type_name: String,
}

/// One classified source column.
#[derive(Debug, Clone)]
pub enum ColumnDescriptor {
    Flat(FlatColumn),
    Variable(VariableColumn),
    Container(ContainerColumn),
}

impl ColumnDescriptor {
    pub fn source_name(&self) -> &str {
        match self {
            Self::Flat(c) => &c.source_name,
            Self::Variable(c) => &c.source_name,
            Self::Container(c) => &c.source_name,
        }
    }

    pub fn target_name(&self) -> &str {
        match self {
            Self::Flat(c) => &c.target_name,
            Self::Variable(c) => &c.target_name,
            Self::Container(c) => &c.target_name,
        }
    }

    /// The target column type this descriptor maps to.
    pub fn type_spec(&self) -> TypeSpec {
        match self {
            Self::Flat(c) if c.len == 1 => TypeSpec::Scalar { elem: c.elem },
            Self::Flat(c) => TypeSpec::FixedArray { elem: c.elem, len: c.len },
            Self::Variable(c) => TypeSpec::Sequence { elem: c.elem, max_len: c.max_len },
            Self::Container(c) => TypeSpec::Named { name: c.type_name.clone() },
        }
    }
}

//==================================================================================
// 2. Name sanitization
//==================================================================================

/// Replaces every literal `.` with `__`. Source tables may use dotted names
/// for nested members; target schemas disallow dots. Applied everywhere a
/// target name is derived from a source name.
pub fn sanitize_column_name(name: &str) -> String {
    name.replace('.', "__")
}

//==================================================================================
// 3. Classification
//==================================================================================

/// Produces an ordered descriptor sequence for exactly the selected columns
/// (all columns when `selection` is empty). Column order is source order and
/// determines target-schema field order.
///
/// A non-empty selection that matches nothing yields an empty result; that is
/// "select nothing", not an error. Duplicate sanitized target names are a
/// configuration error.
pub fn classify_columns(
    columns: &[SourceColumn],
    selection: &[String],
) -> Result<Vec<ColumnDescriptor>, PivotError> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut descriptors = Vec::new();

    for column in columns {
        let target_name = sanitize_column_name(&column.name);
        if !selection.is_empty() && !selection.iter().any(|s| s == &target_name) {
            continue;
        }
        if !seen.insert(target_name.clone()) {
            return Err(PivotError::ConfigError(format!(
                "duplicate target column name '{target_name}'"
            )));
        }

        let descriptor = match &column.storage {
            // Runtime storage kind wins over the declared leaf type: an
            // aggregate is a container regardless of apparent length.
            ColumnStorage::Aggregate { type_name } => {
                ColumnDescriptor::Container(ContainerColumn {
                    source_name: column.name.clone(),
                    target_name,
                    type_name: type_name.clone(),
                })
            }
            ColumnStorage::Leaf { elem, static_len, counter } => match counter {
                Some(counter) => ColumnDescriptor::Variable(VariableColumn {
                    source_name: column.name.clone(),
                    target_name,
                    elem: *elem,
                    elem_size: elem.size_in_bytes(),
                    max_len: counter.max_len,
                    counter: counter.name.clone(),
                }),
                None => {
                    if *static_len == 0 {
                        return Err(PivotError::SourceError(format!(
                            "column '{}' declares a static length of zero",
                            column.name
                        )));
                    }
                    ColumnDescriptor::Flat(FlatColumn {
                        source_name: column.name.clone(),
                        target_name,
                        elem: *elem,
                        elem_size: elem.size_in_bytes(),
                        len: *static_len,
                    })
                }
            },
        };
        log::debug!(
            "column '{}': classified as {} -> '{}'",
            descriptor.source_name(),
            descriptor.type_spec(),
            descriptor.target_name()
        );
        descriptors.push(descriptor);
    }

    Ok(descriptors)
}

//==================================================================================
// 4. Unit tests
//==================================================================================
