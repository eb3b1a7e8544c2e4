//! The Schema Builder: maps classified column descriptors to target column
//! types and accumulates the frozen target schema.
//!
//! The schema is an ordered, append-only mapping from target name to target
//! type. It is built incrementally during classification and irreversibly
//! frozen before any row transfer begins; post-freeze mutation is a
//! programming error and is reported as such.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::classify::ColumnDescriptor;
use crate::error::PivotError;
use crate::target::TargetStore;
use crate::types::TypeSpec;

/// One named, typed field of the target schema.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    pub name: String,
    pub spec: TypeSpec,
}

/// The ordered target schema.
#[derive(Debug, Default)]
pub struct TargetSchema {
    fields: Vec<SchemaField>,
    index: HashMap<String, usize>,
    frozen: bool,
}

impl TargetSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one field. Fails on a duplicate name or on a frozen schema.
    pub fn add_field(&mut self, name: &str, spec: TypeSpec) -> Result<(), PivotError> {
        if self.frozen {
            return Err(PivotError::InternalError(format!(
                "attempted to add field '{name}' to a frozen schema"
            )));
        }
        if self.index.contains_key(name) {
            return Err(PivotError::ConfigError(format!(
                "duplicate target column name '{name}'"
            )));
        }
        self.index.insert(name.to_string(), self.fields.len());
        self.fields.push(SchemaField { name: name.to_string(), spec });
        Ok(())
    }

    /// Irreversibly freezes the field set.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in insertion order.
    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&SchemaField> {
        self.index.get(name).map(|&i| &self.fields[i])
    }
}

/// Builds the frozen target schema from the classified descriptors, declaring
/// every column to the target store and freezing both sides.
///
/// Target stores may reject a type string (e.g. an unsupported named type);
/// that aborts the conversion before any row is transferred.
pub fn build_target_schema(
    descriptors: &[ColumnDescriptor],
    target: &mut dyn TargetStore,
) -> Result<TargetSchema, PivotError> {
    let mut schema = TargetSchema::new();
    for descriptor in descriptors {
        let spec = descriptor.type_spec();
        target.add_column(descriptor.target_name(), &spec.to_string())?;
        schema.add_field(descriptor.target_name(), spec)?;
        log::debug!(
            "add field: '{}' of type '{}'",
            descriptor.target_name(),
            schema.fields().last().map(|f| f.spec.to_string()).unwrap_or_default()
        );
    }
    schema.freeze();
    target.freeze_schema()?;
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ElementType;

    #[test]
    fn fields_keep_insertion_order() {
        let mut schema = TargetSchema::new();
        schema
            .add_field("b", TypeSpec::Scalar { elem: ElementType::Int32 })
            .unwrap();
        schema
            .add_field("a", TypeSpec::Scalar { elem: ElementType::Float64 })
            .unwrap();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(
            schema.get("a").unwrap().spec,
            TypeSpec::Scalar { elem: ElementType::Float64 }
        );
    }

    #[test]
    fn duplicate_field_names_are_rejected() {
        let mut schema = TargetSchema::new();
        schema
            .add_field("a", TypeSpec::Scalar { elem: ElementType::Int32 })
            .unwrap();
        let err = schema
            .add_field("a", TypeSpec::Scalar { elem: ElementType::Int32 })
            .unwrap_err();
        assert!(matches!(err, PivotError::ConfigError(_)), "{err}");
    }

    #[test]
    fn frozen_schema_rejects_further_fields() {
        let mut schema = TargetSchema::new();
        schema.freeze();
        let err = schema
            .add_field("late", TypeSpec::Scalar { elem: ElementType::Int32 })
            .unwrap_err();
        assert!(matches!(err, PivotError::InternalError(_)), "{err}");
        assert!(schema.is_frozen());
    }
}
