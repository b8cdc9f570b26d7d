//! On-disk layout of built record types.
//!
//! A type `app.model.Customer` built under `code_dir` produces
//!
//! ```text
//! code_dir/app/model/Customer.rs              generated source
//! code_dir/app/model/Customer.artifact.json   manifest
//! code_dir/app/model/Customer.retired.json    last destroyed version, if any
//! ```
//!
//! A defined statement writes its accessors to the same `<Name>.rs` location
//! with a `<Name>.statement.json` manifest instead.
//!
//! The manifest is written last and atomically (temp file then rename), so
//! a present manifest always describes a complete build.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::codegen::{ReconcilePlan, StatementSpec, TypeSpec};
use crate::core::identifier::{split_qualified_name, validate_qualified_name};
use crate::error::{Result, TupleGenError};

/// Result of one build attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledArtifact {
    pub spec: TypeSpec,
    /// Toolchain output; empty for a clean build.
    pub diagnostics: String,
    pub success: bool,
    pub source_path: PathBuf,
    pub manifest_path: PathBuf,
}

/// Persisted description of a successful build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub qualified_name: String,
    pub version: u32,
    /// File name of the source next to the manifest.
    pub source_file: String,
    pub source_sha256: String,
    pub toolchain: String,
    pub built_at: DateTime<Utc>,
    pub spec: TypeSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<ReconcilePlan>,
    #[serde(default)]
    pub diagnostics: String,
}

impl ArtifactManifest {
    /// Read a manifest; `Ok(None)` when the file does not exist.
    pub async fn read(path: &Path) -> Result<Option<Self>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the manifest via a temp file and rename.
    pub async fn write_atomic(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_vec_pretty(self)?;
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &content).await?;
        tokio::fs::rename(&temp_path, path).await?;
        Ok(())
    }
}

/// Result of one statement build attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledStatement {
    pub spec: StatementSpec,
    pub diagnostics: String,
    pub success: bool,
    pub source_path: PathBuf,
    pub manifest_path: PathBuf,
}

/// Persisted description of a successful statement build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementManifest {
    pub qualified_name: String,
    pub source_file: String,
    pub source_sha256: String,
    pub toolchain: String,
    pub built_at: DateTime<Utc>,
    pub spec: StatementSpec,
    #[serde(default)]
    pub diagnostics: String,
}

impl StatementManifest {
    /// Read a manifest; `Ok(None)` when the file does not exist.
    pub async fn read(path: &Path) -> Result<Option<Self>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn write_atomic(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_vec_pretty(self)?;
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &content).await?;
        tokio::fs::rename(&temp_path, path).await?;
        Ok(())
    }
}

/// Highest version of a type that was built and then destroyed.
///
/// Kept after `destroy` so a rebuilt type never reuses a version number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetiredVersion {
    pub qualified_name: String,
    pub version: u32,
    pub retired_at: DateTime<Utc>,
}

impl RetiredVersion {
    /// Read the marker; `Ok(None)` when the type was never destroyed.
    pub async fn read(path: &Path) -> Result<Option<Self>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn write(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, serde_json::to_vec_pretty(self)?).await?;
        Ok(())
    }
}

/// File locations of one type under a code directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
    pub source: PathBuf,
    pub manifest: PathBuf,
    pub retired: PathBuf,
    pub statement_manifest: PathBuf,
}

impl ArtifactPaths {
    /// Paths for `qualified_name`, mirroring its namespace as directories.
    pub fn for_type(root: &Path, qualified_name: &str) -> Result<Self> {
        validate_qualified_name(qualified_name)?;
        let (namespace, simple) = split_qualified_name(qualified_name);
        let dir = namespace
            .iter()
            .fold(root.to_path_buf(), |dir, segment| dir.join(segment));
        Ok(Self {
            source: dir.join(format!("{}.rs", simple)),
            manifest: dir.join(format!("{}.artifact.json", simple)),
            retired: dir.join(format!("{}.retired.json", simple)),
            statement_manifest: dir.join(format!("{}.statement.json", simple)),
            dir,
        })
    }

    /// Where source is staged before the toolchain accepts it.
    pub fn pending_source(&self) -> PathBuf {
        self.source.with_extension("rs.pending")
    }

    pub fn source_file_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub(crate) fn output_error(path: &Path, e: impl std::fmt::Display) -> TupleGenError {
    TupleGenError::Toolchain(format!("output location {} is not writable: {}", path.display(), e))
}
