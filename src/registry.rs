//! Name-to-descriptor resolution for externally-defined container types.
//!
//! The original system loads type dictionaries through host-runtime
//! reflection; here that contract is a plain resolution function supplied by
//! the caller. A `TypeRegistry` maps a type name to a `ContainerType`
//! descriptor and fails explicitly when the name is unknown. Nothing is
//! registered implicitly or globally.

use std::any::{Any, TypeId};
use std::sync::Arc;

use hashbrown::HashMap;

use crate::error::PivotError;

/// A shared handle to an opaque container value produced by the source table.
///
/// The target store observes the exact instance the source produced for the
/// current row, by reference; the value is never byte-copied by the engine.
pub type ContainerRef = Arc<dyn Any + Send + Sync>;

/// A resolved descriptor for an externally-defined container type.
///
/// The engine never inspects the container's layout; the descriptor carries
/// just enough to name the type in the target schema and to check that
/// source-produced values actually are instances of it.
#[derive(Debug, Clone)]
pub struct ContainerType {
    name: String,
    type_id: TypeId,
}

impl ContainerType {
    /// Builds the descriptor for the Rust type `T` under an external name.
    pub fn of<T: Any + Send + Sync>(name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_id: TypeId::of::<T>(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `value` is an instance of this descriptor's type.
    pub fn matches(&self, value: &ContainerRef) -> bool {
        value.as_ref().type_id() == self.type_id
    }
}

/// Resolves an external type name to its descriptor. Supplied by the caller;
/// resolution failure is explicit and fatal to a conversion.
pub trait TypeRegistry {
    fn resolve(&self, name: &str) -> Result<Arc<ContainerType>, PivotError>;
}

/// A registry backed by an explicit name map. The test-and-driver analogue of
/// loading dictionaries: every type the conversion will meet is registered up
/// front.
#[derive(Default)]
pub struct StaticRegistry {
    types: HashMap<String, Arc<ContainerType>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the Rust type `T` under `name`, replacing any previous entry.
    pub fn register<T: Any + Send + Sync>(&mut self, name: &str) {
        self.types
            .insert(name.to_string(), Arc::new(ContainerType::of::<T>(name)));
    }
}

impl TypeRegistry for StaticRegistry {
    fn resolve(&self, name: &str) -> Result<Arc<ContainerType>, PivotError> {
        self.types.get(name).cloned().ok_or_else(|| {
            PivotError::ResolutionError(format!(
                "type '{name}' is not present in the supplied registry"
            ))
        })
    }
}
