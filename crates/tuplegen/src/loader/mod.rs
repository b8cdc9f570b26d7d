//! Resolution of built artifacts into independent type handles.
//!
//! Every [`DynamicLoader::load`] produces a fresh [`LoadedType`] with its
//! own generation number, even for a name that is already loaded. Holders
//! of an older handle keep the shape they resolved; nothing is replaced
//! under them. A handle is released by dropping the last `Arc`.

mod registry;

pub use registry::TypeRegistry;

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::build::{sha256_hex, ArtifactManifest, ArtifactPaths, CompiledArtifact};
use crate::codegen::{ReconcilePlan, TypeSpec};
use crate::core::SqlValue;
use crate::error::{Result, TupleGenError};
use crate::record::{coerce, tuple_matches, Record, Tuple};

/// One resolved version of a record type.
#[derive(Debug)]
pub struct LoadedType {
    qualified_name: String,
    generation: u64,
    artifact: CompiledArtifact,
    field_index: HashMap<String, usize>,
    plan: Option<ReconcilePlan>,
    source_sha256: String,
}

impl LoadedType {
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn artifact(&self) -> &CompiledArtifact {
        &self.artifact
    }

    pub fn spec(&self) -> &TypeSpec {
        &self.artifact.spec
    }

    pub fn version(&self) -> u32 {
        self.artifact.spec.version
    }

    pub fn source_sha256(&self) -> &str {
        &self.source_sha256
    }

    /// Reconciliation from the predecessor, when this version has one.
    pub fn reconcile_plan(&self) -> Option<&ReconcilePlan> {
        self.plan.as_ref()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.field_index.get(column).copied()
    }

    /// Build a record from one value per column, converting each value to
    /// its column's semantic type where a conversion exists.
    pub fn materialize(self: &Arc<Self>, values: Vec<SqlValue>) -> Result<Record> {
        let columns = &self.artifact.spec.columns;
        if values.len() != columns.len() {
            return Err(TupleGenError::record(
                &self.qualified_name,
                format!("expected {} values, got {}", columns.len(), values.len()),
            ));
        }
        let values = values
            .into_iter()
            .zip(columns)
            .map(|(value, column)| {
                coerce(&self.qualified_name, &column.name, value, column.semantic_type)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Record::new(self.clone(), values))
    }

    /// Record holding every column's zero value.
    pub fn zero(self: &Arc<Self>) -> Record {
        let values = self
            .artifact
            .spec
            .columns
            .iter()
            .map(|c| c.semantic_type.zero_value())
            .collect();
        Record::new(self.clone(), values)
    }

    /// Record from an instance of this type's generated struct.
    pub fn record_from<T: Tuple>(self: &Arc<Self>, tuple: T) -> Result<Record> {
        if !tuple_matches::<T>(self.spec()) {
            return Err(TupleGenError::record(
                &self.qualified_name,
                format!(
                    "{} version {} is not the shape of version {} of this type",
                    T::NAME,
                    T::VERSION,
                    self.version()
                ),
            ));
        }
        self.materialize(tuple.into_values())
    }

    /// Map a record of the predecessor shape onto this shape.
    ///
    /// A record already of this exact shape is copied unchanged. Name and
    /// version alone do not identify a shape once a type has been destroyed
    /// and rebuilt, so the columns are compared as well.
    pub fn reconcile(self: &Arc<Self>, old: &Record) -> Result<Record> {
        let old_type = old.loaded_type();
        if old_type.qualified_name() == self.qualified_name && old_type.version() == self.version() {
            if old_type.spec() != self.spec() {
                return Err(TupleGenError::record(
                    &self.qualified_name,
                    format!(
                        "record of version {} has a different shape than this version {}",
                        old_type.version(),
                        self.version()
                    ),
                ));
            }
            return Ok(Record::new(self.clone(), old.values().to_vec()));
        }

        let plan = self.plan.as_ref().ok_or_else(|| {
            TupleGenError::record(
                &self.qualified_name,
                format!("version {} has no predecessor to reconcile from", self.version()),
            )
        })?;
        if !plan.accepts(old_type.spec()) {
            return Err(TupleGenError::record(
                &self.qualified_name,
                format!(
                    "cannot reconcile from {} version {}; expected the recorded shape of {} version {}",
                    old_type.qualified_name(),
                    old_type.version(),
                    plan.predecessor_name,
                    plan.predecessor_version
                ),
            ));
        }
        let values = plan.apply(&self.qualified_name, old.values())?;
        Ok(Record::new(self.clone(), values))
    }
}

/// Loads built artifacts, numbering each load with a new generation.
#[derive(Debug, Default)]
pub struct DynamicLoader {
    generations: AtomicU64,
    registry: TypeRegistry,
}

impl DynamicLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Resolve the most recent successful build of `qualified_name` under
    /// `location` into a new handle.
    ///
    /// A missing manifest or source, an unreadable manifest or a source
    /// that no longer matches its recorded hash is a `Load` error.
    pub async fn load(&self, qualified_name: &str, location: &Path) -> Result<Arc<LoadedType>> {
        let paths = ArtifactPaths::for_type(location, qualified_name)?;
        let fail = |message: String| TupleGenError::load(qualified_name, message);

        let manifest = ArtifactManifest::read(&paths.manifest)
            .await
            .map_err(|e| fail(format!("manifest {} is unreadable: {}", paths.manifest.display(), e)))?
            .ok_or_else(|| fail(format!("no artifact at {}", paths.manifest.display())))?;

        if manifest.qualified_name != qualified_name || manifest.spec.qualified_name != qualified_name {
            return Err(fail(format!(
                "manifest {} describes {}",
                paths.manifest.display(),
                manifest.qualified_name
            )));
        }
        if manifest.version != manifest.spec.version {
            return Err(fail(format!(
                "manifest version {} disagrees with spec version {}",
                manifest.version, manifest.spec.version
            )));
        }

        let source_path = paths.dir.join(&manifest.source_file);
        let source = tokio::fs::read(&source_path)
            .await
            .map_err(|e| fail(format!("source {} is unreadable: {}", source_path.display(), e)))?;
        let digest = sha256_hex(&source);
        if digest != manifest.source_sha256 {
            return Err(fail(format!(
                "source {} does not match its manifest; rebuild required",
                source_path.display()
            )));
        }

        let field_index = manifest
            .spec
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;

        let handle = Arc::new(LoadedType {
            qualified_name: qualified_name.to_string(),
            generation,
            artifact: CompiledArtifact {
                spec: manifest.spec,
                diagnostics: manifest.diagnostics,
                success: true,
                source_path,
                manifest_path: paths.manifest,
            },
            field_index,
            plan: manifest.plan,
            source_sha256: digest,
        });
        self.registry.register(&handle);

        info!(
            "Loaded {} version {} as generation {}",
            qualified_name,
            handle.version(),
            generation
        );
        debug!("{} source {}", qualified_name, handle.artifact.source_path.display());
        Ok(handle)
    }
}
