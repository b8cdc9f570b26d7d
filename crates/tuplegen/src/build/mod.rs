//! Turns synthesized source into a loadable artifact on disk.
//!
//! A build stages the source next to its final location, runs the
//! configured [`Toolchain`] over it, and only on success moves the source
//! into place and writes the manifest. A rejected build leaves any
//! previous artifact of the same type untouched.

pub mod artifact;
pub mod toolchain;

pub use artifact::{
    sha256_hex, ArtifactManifest, ArtifactPaths, CompiledArtifact, CompiledStatement, RetiredVersion,
    StatementManifest,
};
pub use toolchain::{toolchain_for, RustfmtToolchain, SynToolchain, Toolchain, ToolchainReport};

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::codegen::{SynthesizedSource, SynthesizedStatement};
use crate::config::CodegenConfig;
use crate::error::Result;
use crate::messages::Msg;

use artifact::output_error;

/// Builds record types, serializing builds of the same qualified name.
pub struct BuildBridge {
    toolchain: Box<dyn Toolchain>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Default for BuildBridge {
    fn default() -> Self {
        Self::new(Box::new(SynToolchain))
    }
}

impl BuildBridge {
    pub fn new(toolchain: Box<dyn Toolchain>) -> Self {
        Self {
            toolchain,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &CodegenConfig) -> Self {
        Self::new(toolchain_for(config.toolchain))
    }

    pub fn toolchain_name(&self) -> &str {
        self.toolchain.name()
    }

    async fn lock_for(&self, qualified_name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(qualified_name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the lock of `qualified_name` once no build holds or awaits it.
    async fn release_lock(&self, qualified_name: &str) {
        let mut locks = self.locks.lock().await;
        if locks
            .get(qualified_name)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(qualified_name);
        }
    }

    /// Run `build` while holding the lock of `qualified_name`.
    async fn serialized<T>(
        &self,
        qualified_name: &str,
        build: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let lock = self.lock_for(qualified_name).await;
        let result = {
            let _guard = lock.lock().await;
            build.await
        };
        drop(lock);
        self.release_lock(qualified_name).await;
        result
    }

    /// Build `unit` under `output_root`.
    ///
    /// A rejected source yields `success = false` with diagnostics. `Err`
    /// means the output location is unusable or the toolchain cannot run.
    pub async fn build(&self, unit: &SynthesizedSource, output_root: &Path) -> Result<CompiledArtifact> {
        self.serialized(&unit.spec.qualified_name, self.build_locked(unit, output_root))
            .await
    }

    /// Build the accessors of a defined statement under `output_root`.
    pub async fn build_statement(
        &self,
        unit: &SynthesizedStatement,
        output_root: &Path,
    ) -> Result<CompiledStatement> {
        self.serialized(
            &unit.spec.qualified_name,
            self.build_statement_locked(unit, output_root),
        )
        .await
    }

    async fn build_locked(&self, unit: &SynthesizedSource, output_root: &Path) -> Result<CompiledArtifact> {
        let spec = &unit.spec;
        let paths = ArtifactPaths::for_type(output_root, &spec.qualified_name)?;

        let (source_text, diagnostics) = match self
            .stage(&paths, &spec.qualified_name, spec.simple_name(), &unit.source_text)
            .await?
        {
            Checked::Accepted {
                source_text,
                diagnostics,
            } => (source_text, diagnostics),
            Checked::Rejected(diagnostics) => {
                return Ok(CompiledArtifact {
                    spec: spec.clone(),
                    diagnostics,
                    success: false,
                    source_path: paths.source,
                    manifest_path: paths.manifest,
                })
            }
        };

        let manifest = ArtifactManifest {
            qualified_name: spec.qualified_name.clone(),
            version: spec.version,
            source_file: paths.source_file_name(),
            source_sha256: sha256_hex(source_text.as_bytes()),
            toolchain: self.toolchain.name().to_string(),
            built_at: Utc::now(),
            spec: spec.clone(),
            plan: unit.plan.clone(),
            diagnostics: diagnostics.clone(),
        };
        manifest
            .write_atomic(&paths.manifest)
            .await
            .map_err(|e| output_error(&paths.manifest, e))?;

        info!(
            "{}",
            Msg::BuildSucceeded.format(&[&spec.qualified_name, &spec.version])
        );

        Ok(CompiledArtifact {
            spec: spec.clone(),
            diagnostics,
            success: true,
            source_path: paths.source,
            manifest_path: paths.manifest,
        })
    }

    async fn build_statement_locked(
        &self,
        unit: &SynthesizedStatement,
        output_root: &Path,
    ) -> Result<CompiledStatement> {
        let spec = &unit.spec;
        let paths = ArtifactPaths::for_type(output_root, &spec.qualified_name)?;

        let (source_text, diagnostics) = match self
            .stage(&paths, &spec.qualified_name, spec.simple_name(), &unit.source_text)
            .await?
        {
            Checked::Accepted {
                source_text,
                diagnostics,
            } => (source_text, diagnostics),
            Checked::Rejected(diagnostics) => {
                return Ok(CompiledStatement {
                    spec: spec.clone(),
                    diagnostics,
                    success: false,
                    source_path: paths.source,
                    manifest_path: paths.statement_manifest,
                })
            }
        };

        StatementManifest {
            qualified_name: spec.qualified_name.clone(),
            source_file: paths.source_file_name(),
            source_sha256: sha256_hex(source_text.as_bytes()),
            toolchain: self.toolchain.name().to_string(),
            built_at: Utc::now(),
            spec: spec.clone(),
            diagnostics: diagnostics.clone(),
        }
        .write_atomic(&paths.statement_manifest)
        .await
        .map_err(|e| output_error(&paths.statement_manifest, e))?;

        info!("Built statement {}", spec.qualified_name);

        Ok(CompiledStatement {
            spec: spec.clone(),
            diagnostics,
            success: true,
            source_path: paths.source,
            manifest_path: paths.statement_manifest,
        })
    }

    /// Stage `source_text`, check it, and move accepted source into place.
    async fn stage(
        &self,
        paths: &ArtifactPaths,
        qualified_name: &str,
        type_name: &str,
        source_text: &str,
    ) -> Result<Checked> {
        tokio::fs::create_dir_all(&paths.dir)
            .await
            .map_err(|e| output_error(&paths.dir, e))?;
        let pending = paths.pending_source();
        tokio::fs::write(&pending, source_text)
            .await
            .map_err(|e| output_error(&pending, e))?;
        debug!("staged {} at {}", qualified_name, pending.display());

        let report = match self.toolchain.check(&pending, source_text, type_name).await {
            Ok(report) => report,
            Err(e) => {
                discard(&pending).await;
                return Err(e);
            }
        };

        if !report.success {
            discard(&pending).await;
            warn!(
                "{}",
                Msg::BuildFailed.format(&[&qualified_name, &report.diagnostics])
            );
            return Ok(Checked::Rejected(report.diagnostics));
        }

        let source_text = match report.formatted {
            Some(formatted) => {
                tokio::fs::write(&pending, &formatted)
                    .await
                    .map_err(|e| output_error(&pending, e))?;
                formatted
            }
            None => source_text.to_string(),
        };
        tokio::fs::rename(&pending, &paths.source)
            .await
            .map_err(|e| output_error(&paths.source, e))?;

        Ok(Checked::Accepted {
            source_text,
            diagnostics: report.diagnostics,
        })
    }
}

enum Checked {
    Accepted { source_text: String, diagnostics: String },
    Rejected(String),
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Failed to remove staged source {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::{SourceSynthesizer, TypeSpecBuilder};
    use crate::core::SemanticType;

    fn unit(name: &str) -> SynthesizedSource {
        let mut b = TypeSpecBuilder::new_spec(name).unwrap();
        b.add_column("x", SemanticType::Int).unwrap();
        SourceSynthesizer::new()
            .synthesize(&b.build().unwrap())
            .unwrap()
    }

    #[tokio::test]
    async fn test_build_writes_source_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = BuildBridge::default();
        let artifact = bridge.build(&unit("app.T"), dir.path()).await.unwrap();

        assert!(artifact.success);
        assert_eq!(artifact.source_path, dir.path().join("app").join("T.rs"));
        assert!(artifact.source_path.exists());
        assert!(artifact.manifest_path.exists());
        assert!(!artifact.source_path.with_extension("rs.pending").exists());

        let manifest = ArtifactManifest::read(&artifact.manifest_path)
            .await
            .unwrap()
            .unwrap();
        let source = std::fs::read(&artifact.source_path).unwrap();
        assert_eq!(manifest.source_sha256, sha256_hex(&source));
        assert_eq!(manifest.toolchain, "syn");
    }

    #[tokio::test]
    async fn test_failed_build_keeps_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = BuildBridge::default();
        let good = unit("app.T");
        bridge.build(&good, dir.path()).await.unwrap();

        let mut broken = good.clone();
        broken.source_text.push_str("\nfn broken( {\n");
        let artifact = bridge.build(&broken, dir.path()).await.unwrap();

        assert!(!artifact.success);
        assert!(!artifact.diagnostics.is_empty());
        let on_disk = std::fs::read_to_string(&artifact.source_path).unwrap();
        assert_eq!(on_disk, good.source_text);
        assert!(!artifact.source_path.with_extension("rs.pending").exists());
    }

    #[tokio::test]
    async fn test_unwritable_location_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("app");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let err = BuildBridge::default()
            .build(&unit("app.T"), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::TupleGenError::Toolchain(_)));
    }

    #[tokio::test]
    async fn test_concurrent_builds_same_name() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = Arc::new(BuildBridge::default());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let bridge = bridge.clone();
            let root = dir.path().to_path_buf();
            handles.push(tokio::spawn(async move {
                bridge.build(&unit("app.T"), &root).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().success);
        }
        assert!(bridge.locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_statement_build_writes_its_own_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let spec = crate::codegen::StatementSpec::update(
            "app.Touch",
            "UPDATE item SET qty = qty + 1 WHERE id = ?",
            &[1i64.into()],
        )
        .unwrap();
        let unit = SourceSynthesizer::new().synthesize_statement(&spec).unwrap();
        let bridge = BuildBridge::default();
        let built = bridge.build_statement(&unit, dir.path()).await.unwrap();

        assert!(built.success);
        assert_eq!(built.source_path, dir.path().join("app").join("Touch.rs"));
        assert_eq!(
            built.manifest_path,
            dir.path().join("app").join("Touch.statement.json")
        );
        let manifest = StatementManifest::read(&built.manifest_path)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(manifest.spec, spec);
        assert_eq!(
            manifest.source_sha256,
            sha256_hex(&std::fs::read(&built.source_path).unwrap())
        );
        assert!(bridge.locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_locks_released_after_build() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = BuildBridge::default();
        for name in ["app.A", "app.B", "app.C"] {
            bridge.build(&unit(name), dir.path()).await.unwrap();
        }
        assert!(bridge.locks.lock().await.is_empty());

        // Failed builds release their lock too.
        let blocked = tempfile::tempdir().unwrap();
        std::fs::write(blocked.path().join("app"), b"not a directory").unwrap();
        assert!(bridge.build(&unit("app.D"), blocked.path()).await.is_err());
        assert!(bridge.locks.lock().await.is_empty());
    }
}
