//! Probe, build and load record types in one place.
//!
//! Besides record types, a factory defines named statements: a query gets a
//! record type for its rows plus typed accessors, a query over a table also
//! gets keyed insert/update/delete, and an update gets a typed executor.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::build::{
    ArtifactManifest, ArtifactPaths, BuildBridge, CompiledArtifact, CompiledStatement, RetiredVersion,
    StatementManifest,
};
use crate::codegen::{SourceSynthesizer, StatementSpec, TableWrites, TypeSpec, TypeSpecBuilder};
use crate::config::CodegenConfig;
use crate::core::identifier::type_name_for_table;
use crate::core::traits::Dialect;
use crate::core::{ColumnDescriptor, SqlValue};
use crate::db::ConnectionManager;
use crate::dialect::replace_table_prefix;
use crate::error::{Result, TupleGenError};
use crate::loader::{DynamicLoader, LoadedType};

/// Generates record types from live schemas into one code directory.
///
/// Regenerating a type whose probed shape matches the last build reuses
/// that build. A changed shape becomes the next version, with a
/// reconciliation procedure from the previous one.
pub struct TypeFactory {
    db: ConnectionManager,
    code_dir: PathBuf,
    namespace: String,
    synthesizer: SourceSynthesizer,
    bridge: BuildBridge,
    loader: DynamicLoader,
}

impl TypeFactory {
    pub fn new(db: ConnectionManager, config: &CodegenConfig) -> Self {
        Self {
            db,
            code_dir: config.code_dir.clone(),
            namespace: config.namespace.clone(),
            synthesizer: SourceSynthesizer::new(),
            bridge: BuildBridge::from_config(config),
            loader: DynamicLoader::new(),
        }
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.db
    }

    pub fn code_dir(&self) -> &Path {
        &self.code_dir
    }

    pub fn loader(&self) -> &DynamicLoader {
        &self.loader
    }

    /// Dotted names are used as given; simple names join the configured namespace.
    pub fn qualify(&self, name: &str) -> String {
        if name.contains('.') || self.namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.namespace, name)
        }
    }

    /// Generate `name` from the result shape of `sql`.
    pub async fn generate_from_query(&self, name: &str, sql: &str) -> Result<CompiledArtifact> {
        let columns = self.db.probe().probe_query(sql).await?;
        self.generate_from_columns(name, columns).await
    }

    /// Generate `name` from the columns of `table`.
    pub async fn generate_from_table(&self, name: &str, table: &str) -> Result<CompiledArtifact> {
        let columns = self.db.probe().probe_table(table).await?;
        self.generate_from_columns(name, columns).await
    }

    /// Generate `name` from explicit columns, against the last build if any.
    pub async fn generate_from_columns(
        &self,
        name: &str,
        columns: Vec<ColumnDescriptor>,
    ) -> Result<CompiledArtifact> {
        let name = self.qualify(name);
        let mut builder = TypeSpecBuilder::new_spec(&name)?;
        for column in columns {
            builder.add_descriptor(column)?;
        }

        if let Some(prior) = self.existing_spec(&name).await? {
            if builder.diff_against(&prior).is_unchanged() {
                debug!("{} is unchanged at version {}", name, prior.version);
                return self.existing_artifact(&name).await;
            }
            builder = builder.against(prior);
        }
        self.generate_from_spec(builder).await
    }

    /// Synthesize and build a finished builder.
    ///
    /// A name that was destroyed earlier continues past its last version.
    pub async fn generate_from_spec(&self, builder: TypeSpecBuilder) -> Result<CompiledArtifact> {
        let paths = ArtifactPaths::for_type(&self.code_dir, builder.qualified_name())?;
        if tokio::fs::try_exists(&paths.statement_manifest).await? {
            return Err(TupleGenError::invalid_name(
                builder.qualified_name(),
                "already names a defined statement",
            ));
        }
        let builder = match RetiredVersion::read(&paths.retired).await? {
            Some(retired) => builder.at_least_version(retired.version + 1),
            None => builder,
        };
        let built = builder.build()?;
        let unit = self.synthesizer.synthesize(&built)?;
        info!(
            "Building {} version {} ({} columns)",
            built.spec.qualified_name,
            built.spec.version,
            built.spec.columns.len()
        );
        self.bridge.build(&unit, &self.code_dir).await
    }

    /// Edit the last built spec of `name` and build the result as the next version.
    pub async fn evolve<F>(&self, name: &str, edit: F) -> Result<CompiledArtifact>
    where
        F: FnOnce(&mut TypeSpecBuilder) -> Result<()>,
    {
        let name = self.qualify(name);
        let prior = self
            .existing_spec(&name)
            .await?
            .ok_or_else(|| TupleGenError::load(&name, "no existing build to evolve"))?;
        let mut builder = TypeSpecBuilder::evolve(&prior);
        edit(&mut builder)?;
        self.generate_from_spec(builder).await
    }

    /// Start a new type `new_name` from the last build of `name`.
    pub async fn copy_to<F>(&self, name: &str, new_name: &str, edit: F) -> Result<CompiledArtifact>
    where
        F: FnOnce(&mut TypeSpecBuilder) -> Result<()>,
    {
        let name = self.qualify(name);
        let prior = self
            .existing_spec(&name)
            .await?
            .ok_or_else(|| TupleGenError::load(&name, "no existing build to copy"))?;
        let mut builder = TypeSpecBuilder::copy_to(&prior, &self.qualify(new_name))?;
        edit(&mut builder)?;
        self.generate_from_spec(builder).await
    }

    /// Define the query `name`: a record type `<name>Tuple` for its rows and
    /// accessors binding one typed argument per `?`.
    ///
    /// `args` are sample arguments; their kinds become the parameter types.
    pub async fn define_query(&self, name: &str, sql: &str, args: &[SqlValue]) -> Result<CompiledStatement> {
        let name = self.qualify(name);
        self.ensure_statement_name(&name).await?;
        let columns = self.db.probe().probe_query(sql).await?;
        self.define_rows(&name, sql, args, columns, None).await
    }

    /// Define the query `name` over `table`, adding keyed insert, update and
    /// delete of its rows. The table's primary key must be selected.
    pub async fn define_query_for_table(
        &self,
        name: &str,
        table: &str,
        sql: &str,
        args: &[SqlValue],
    ) -> Result<CompiledStatement> {
        let name = self.qualify(name);
        self.ensure_statement_name(&name).await?;
        let columns = self.db.probe().probe_query(sql).await?;
        let resolved = replace_table_prefix(table, self.db.table_prefix());
        let keys = self.db.primary_key(table).await?;
        let writes = TableWrites::new(self.db.dialect(), &name, &resolved, &columns, keys)?;
        self.define_rows(&name, sql, args, columns, Some(writes)).await
    }

    /// Define a query over every column of `table`, named after the table
    /// (`$$order_item` defines `OrderItem`), optionally filtered by
    /// `where_clause` with `?` parameters bound from `args`.
    pub async fn define_table(
        &self,
        table: &str,
        where_clause: Option<&str>,
        args: &[SqlValue],
    ) -> Result<CompiledStatement> {
        let name = type_name_for_table(table)?;
        let columns = self.db.probe().probe_table(table).await?;
        let dialect = self.db.dialect();
        let selected: Vec<String> = columns.iter().map(|c| dialect.quote_ident(&c.name)).collect();
        let mut sql = format!(
            "SELECT {} FROM {}",
            selected.join(", "),
            dialect.quote_table(table)?
        );
        if let Some(clause) = where_clause.filter(|c| !c.trim().is_empty()) {
            sql.push_str(" WHERE ");
            sql.push_str(clause);
        }
        self.define_query_for_table(&name, table, &sql, args).await
    }

    /// Define the update `name` with a typed executor.
    ///
    /// The statement is run once with `args` inside a transaction that is
    /// rolled back, so a statement the database rejects is never generated.
    pub async fn define_update(&self, name: &str, sql: &str, args: &[SqlValue]) -> Result<CompiledStatement> {
        let name = self.qualify(name);
        self.ensure_statement_name(&name).await?;
        let spec = StatementSpec::update(&name, sql, args)?;

        let mut tx = self.db.begin().await?;
        let checked = tx.execute(sql, args).await;
        tx.rollback().await?;
        let affected = checked?;
        debug!("{} affects {} rows with its sample arguments", name, affected);

        self.build_statement(&spec).await
    }

    /// Spec of the last successful build of the statement `name`.
    pub async fn existing_statement(&self, name: &str) -> Result<Option<StatementSpec>> {
        let paths = ArtifactPaths::for_type(&self.code_dir, &self.qualify(name))?;
        Ok(StatementManifest::read(&paths.statement_manifest)
            .await?
            .map(|m| m.spec))
    }

    async fn define_rows(
        &self,
        name: &str,
        sql: &str,
        args: &[SqlValue],
        columns: Vec<ColumnDescriptor>,
        table: Option<TableWrites>,
    ) -> Result<CompiledStatement> {
        let tuple_name = format!("{}Tuple", name);
        // Reject bad arguments before anything is written.
        StatementSpec::query(name, sql, args, &tuple_name, columns.clone(), table.clone())?;

        let tuple = self.generate_from_columns(&tuple_name, columns).await?;
        if !tuple.success {
            return Err(TupleGenError::load(
                &tuple_name,
                format!("build rejected: {}", tuple.diagnostics),
            ));
        }
        let spec = StatementSpec::query(
            name,
            sql,
            args,
            &tuple.spec.qualified_name,
            tuple.spec.columns,
            table,
        )?;
        self.build_statement(&spec).await
    }

    async fn build_statement(&self, spec: &StatementSpec) -> Result<CompiledStatement> {
        let unit = self.synthesizer.synthesize_statement(spec)?;
        info!(
            "Building statement {} ({} parameters)",
            spec.qualified_name,
            spec.params.len()
        );
        self.bridge.build_statement(&unit, &self.code_dir).await
    }

    /// A statement may not reuse the name of a record type.
    async fn ensure_statement_name(&self, name: &str) -> Result<()> {
        let paths = ArtifactPaths::for_type(&self.code_dir, name)?;
        if tokio::fs::try_exists(&paths.manifest).await? {
            return Err(TupleGenError::invalid_name(name, "already names a record type"));
        }
        Ok(())
    }

    /// Load the latest build of `name` as a new handle.
    pub async fn load(&self, name: &str) -> Result<Arc<LoadedType>> {
        self.loader.load(&self.qualify(name), &self.code_dir).await
    }

    /// Spec of the last successful build of `name`.
    pub async fn existing_spec(&self, name: &str) -> Result<Option<TypeSpec>> {
        let paths = ArtifactPaths::for_type(&self.code_dir, &self.qualify(name))?;
        Ok(ArtifactManifest::read(&paths.manifest).await?.map(|m| m.spec))
    }

    async fn existing_artifact(&self, name: &str) -> Result<CompiledArtifact> {
        let paths = ArtifactPaths::for_type(&self.code_dir, name)?;
        let manifest = ArtifactManifest::read(&paths.manifest)
            .await?
            .ok_or_else(|| TupleGenError::load(name, "manifest disappeared"))?;
        Ok(CompiledArtifact {
            spec: manifest.spec,
            diagnostics: manifest.diagnostics,
            success: true,
            source_path: paths.dir.join(&manifest.source_file),
            manifest_path: paths.manifest,
        })
    }

    /// Remove the generated files of `name`, a record type or a statement.
    /// Returns whether anything was removed.
    ///
    /// Handles already loaded stay usable. The destroyed version of a type
    /// is kept as a floor for later builds of the same name. A statement's
    /// row type is a separate type and is left in place.
    pub async fn destroy(&self, name: &str) -> Result<bool> {
        let name = self.qualify(name);
        let paths = ArtifactPaths::for_type(&self.code_dir, &name)?;
        if let Some(manifest) = ArtifactManifest::read(&paths.manifest).await? {
            let floor = RetiredVersion::read(&paths.retired)
                .await?
                .map_or(0, |r| r.version);
            RetiredVersion {
                qualified_name: name.clone(),
                version: manifest.version.max(floor),
                retired_at: Utc::now(),
            }
            .write(&paths.retired)
            .await?;
        }
        let mut removed = false;
        for path in [
            &paths.manifest,
            &paths.statement_manifest,
            &paths.source,
            &paths.pending_source(),
        ] {
            match tokio::fs::remove_file(path).await {
                Ok(()) => removed = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        if removed {
            info!("Destroyed generated type {}", name);
        }
        Ok(removed)
    }
}
