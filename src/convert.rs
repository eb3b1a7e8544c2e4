//! The Conversion Facade: the single entry point that orchestrates
//! classification, schema building, buffer binding, and the transfer loop.
//!
//! A `Converter` owns the configuration, the injected type registry, and the
//! optional progress callback for one or more conversions. `convert` either
//! returns with the target store finalized (exactly the selected columns, all
//! rows) or fails with a specific error and an unspecified, possibly empty or
//! partial, target state. There is no rollback and no retry.

use std::sync::Arc;

use hashbrown::HashMap;

use crate::bind::ColumnBindings;
use crate::classify::{classify_columns, ColumnDescriptor};
use crate::config::PivotConfig;
use crate::error::PivotError;
use crate::registry::{ContainerType, TypeRegistry};
use crate::schema::build_target_schema;
use crate::source::SourceTable;
use crate::target::TargetStore;
use crate::transfer::{transfer_rows, ProgressFn};

/// The phases of one conversion, in order. There is no retry phase: a
/// failure during `Transferring` aborts the whole conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertPhase {
    Idle,
    SchemaReady,
    Transferring,
    Complete,
}

/// What a finished conversion produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertSummary {
    pub rows: u64,
    pub columns: usize,
}

/// The conversion facade.
pub struct Converter {
    config: PivotConfig,
    registry: Option<Arc<dyn TypeRegistry>>,
    progress: Option<ProgressFn>,
    phase: ConvertPhase,
}

impl Converter {
    /// Builds a converter from a validated configuration. Configuration
    /// problems surface here, before any I/O.
    pub fn new(config: PivotConfig) -> Result<Self, PivotError> {
        config.validate()?;
        Ok(Self {
            config,
            registry: None,
            progress: None,
            phase: ConvertPhase::Idle,
        })
    }

    /// Injects the registry that resolves externally-defined container types.
    pub fn with_registry(mut self, registry: Arc<dyn TypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Installs a progress callback, invoked with `(rows_done, rows_total)`
    /// after each committed row.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Restricts the conversion to the given sanitized target column names.
    pub fn select_columns(&mut self, columns: Vec<String>) {
        self.config.columns = columns;
    }

    /// Clears any projection; all source columns convert.
    pub fn select_all_columns(&mut self) {
        self.config.columns.clear();
    }

    pub fn phase(&self) -> ConvertPhase {
        self.phase
    }

    pub fn config(&self) -> &PivotConfig {
        &self.config
    }

    /// Runs one whole-table conversion. On success the target is finalized
    /// with exactly the selected columns and all source rows, in source row
    /// order.
    pub fn convert(
        &mut self,
        source: &mut dyn SourceTable,
        target: &mut dyn TargetStore,
    ) -> Result<ConvertSummary, PivotError> {
        self.phase = ConvertPhase::Idle;
        source.enable_multithreaded_io(self.config.multithreaded_io);

        // 1. Discover and classify the source schema.
        let columns = source.columns();
        log::info!(
            "converting table '{}': {} source columns, {} rows",
            source.name(),
            columns.len(),
            source.row_count()
        );
        let descriptors = classify_columns(&columns, &self.config.columns)?;

        // 2. Resolve every container type up front. A resolution failure must
        //    leave the target without any trace of a schema.
        let resolved = self.resolve_container_types(&descriptors)?;

        // 3. Build and freeze the target schema.
        target.set_compression(self.config.compression.setting());
        let schema = build_target_schema(&descriptors, target)?;
        self.phase = ConvertPhase::SchemaReady;
        log::info!("target schema frozen: {} columns", schema.len());

        // 4. Bind buffers and stream all rows.
        let mut bindings = ColumnBindings::bind(&descriptors, &resolved)?;
        self.phase = ConvertPhase::Transferring;
        let rows = transfer_rows(source, &mut bindings, target, self.progress.as_mut())?;

        // 5. Finalize the target.
        target.finalize()?;
        self.phase = ConvertPhase::Complete;
        log::info!("conversion completed: {rows} rows");

        Ok(ConvertSummary { rows, columns: descriptors.len() })
    }

    /// Resolves the configured dictionary names plus the type of every
    /// classified container column. All failures here are fatal and happen
    /// before the target sees a single column.
    fn resolve_container_types(
        &self,
        descriptors: &[ColumnDescriptor],
    ) -> Result<HashMap<String, Arc<ContainerType>>, PivotError> {
        let mut resolved: HashMap<String, Arc<ContainerType>> = HashMap::new();
        let needs_registry = !self.config.dictionaries.is_empty()
            || descriptors
                .iter()
                .any(|d| matches!(d, ColumnDescriptor::Container(_)));
        if !needs_registry {
            return Ok(resolved);
        }
        let registry = self.registry.as_ref().ok_or_else(|| {
            PivotError::ResolutionError(
                "the conversion needs container types but no type registry was supplied"
                    .to_string(),
            )
        })?;

        for name in &self.config.dictionaries {
            let ty = registry.resolve(name)?;
            log::debug!("resolved dictionary type '{}'", ty.name());
            resolved.insert(name.clone(), ty);
        }
        for descriptor in descriptors {
            if let ColumnDescriptor::Container(container) = descriptor {
                if !resolved.contains_key(&container.type_name) {
                    let ty = registry.resolve(&container.type_name)?;
                    log::debug!(
                        "resolved container type '{}' for column '{}'",
                        ty.name(),
                        container.source_name
                    );
                    resolved.insert(container.type_name.clone(), ty);
                }
            }
        }
        Ok(resolved)
    }
}
