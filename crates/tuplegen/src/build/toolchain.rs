//! Checkers that accept or reject synthesized source.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::ToolchainKind;
use crate::error::{Result, TupleGenError};

/// Outcome of checking one source unit.
#[derive(Debug, Clone, Default)]
pub struct ToolchainReport {
    pub success: bool,
    pub diagnostics: String,
    /// Replacement text when the toolchain rewrites the source.
    pub formatted: Option<String>,
}

impl ToolchainReport {
    fn accepted(formatted: Option<String>) -> Self {
        Self {
            success: true,
            diagnostics: String::new(),
            formatted,
        }
    }

    fn rejected(diagnostics: String) -> Self {
        Self {
            success: false,
            diagnostics,
            formatted: None,
        }
    }
}

/// A checker for synthesized source.
///
/// Rejections are reported in the returned [`ToolchainReport`]. `Err` is
/// reserved for a toolchain that cannot run at all.
#[async_trait]
pub trait Toolchain: Send + Sync {
    fn name(&self) -> &str;

    /// Check `source`, staged at `path`, which must define the struct `type_name`.
    async fn check(&self, path: &Path, source: &str, type_name: &str) -> Result<ToolchainReport>;
}

/// Toolchain for a configured kind.
pub fn toolchain_for(kind: ToolchainKind) -> Box<dyn Toolchain> {
    match kind {
        ToolchainKind::Syn => Box::new(SynToolchain),
        ToolchainKind::Rustfmt => Box::new(RustfmtToolchain::default()),
    }
}

/// In-process parse with `syn` plus shape checks on the record struct.
#[derive(Debug, Clone, Copy, Default)]
pub struct SynToolchain;

#[async_trait]
impl Toolchain for SynToolchain {
    fn name(&self) -> &str {
        "syn"
    }

    async fn check(&self, path: &Path, source: &str, type_name: &str) -> Result<ToolchainReport> {
        let file = match syn::parse_file(source) {
            Ok(file) => file,
            Err(e) => {
                let diagnostics = e
                    .into_iter()
                    .map(|err| {
                        let start = err.span().start();
                        format!(
                            "{}:{}:{}: error: {}",
                            path.display(),
                            start.line,
                            start.column + 1,
                            err
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                return Ok(ToolchainReport::rejected(diagnostics));
            }
        };

        let Some(record) = file.items.iter().find_map(|item| match item {
            syn::Item::Struct(s) if s.ident == type_name => Some(s),
            _ => None,
        }) else {
            return Ok(ToolchainReport::rejected(format!(
                "{}: error: record struct `{}` is not defined",
                path.display(),
                type_name
            )));
        };

        let mut seen = HashSet::new();
        for field in &record.fields {
            if let Some(ident) = &field.ident {
                if !seen.insert(ident.to_string()) {
                    let start = ident.span().start();
                    return Ok(ToolchainReport::rejected(format!(
                        "{}:{}:{}: error: field `{}` is already declared in `{}`",
                        path.display(),
                        start.line,
                        start.column + 1,
                        ident,
                        type_name
                    )));
                }
            }
        }

        debug!("{} parsed: {} items", path.display(), file.items.len());
        Ok(ToolchainReport::accepted(None))
    }
}

/// External `rustfmt` run over the source on stdin.
///
/// A parse error makes rustfmt exit non-zero with diagnostics on stderr;
/// accepted source is replaced by its formatted form.
#[derive(Debug, Clone)]
pub struct RustfmtToolchain {
    binary: PathBuf,
    edition: String,
}

impl Default for RustfmtToolchain {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("rustfmt"),
            edition: "2021".to_string(),
        }
    }
}

impl RustfmtToolchain {
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Toolchain for RustfmtToolchain {
    fn name(&self) -> &str {
        "rustfmt"
    }

    async fn check(&self, path: &Path, source: &str, _type_name: &str) -> Result<ToolchainReport> {
        let mut child = Command::new(&self.binary)
            .arg("--edition")
            .arg(&self.edition)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                TupleGenError::Toolchain(format!(
                    "cannot run {}: {}",
                    self.binary.display(),
                    e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(source.as_bytes()).await?;
        }
        let output = child.wait_with_output().await?;

        if output.status.success() {
            let formatted = String::from_utf8_lossy(&output.stdout).into_owned();
            return Ok(ToolchainReport::accepted(Some(formatted)));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(ToolchainReport::rejected(
            stderr.replace("<stdin>", &path.display().to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_syn_accepts_struct() {
        let report = SynToolchain
            .check(Path::new("T.rs"), "pub struct T { pub a: Option<i32> }", "T")
            .await
            .unwrap();
        assert!(report.success);
        assert!(report.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_syn_reports_position() {
        let report = SynToolchain
            .check(Path::new("T.rs"), "pub struct T {\n    pub a: ,\n}", "T")
            .await
            .unwrap();
        assert!(!report.success);
        assert!(report.diagnostics.starts_with("T.rs:2:"));
    }

    #[tokio::test]
    async fn test_syn_requires_record_struct() {
        let report = SynToolchain
            .check(Path::new("T.rs"), "pub struct U;", "T")
            .await
            .unwrap();
        assert!(!report.success);
        assert!(report.diagnostics.contains("record struct `T` is not defined"));
    }

    #[tokio::test]
    async fn test_syn_rejects_duplicate_fields() {
        let report = SynToolchain
            .check(Path::new("T.rs"), "pub struct T { a: i32, a: i64 }", "T")
            .await
            .unwrap();
        assert!(!report.success);
        assert!(report.diagnostics.contains("field `a` is already declared"));
    }

    #[tokio::test]
    async fn test_missing_rustfmt_is_toolchain_error() {
        let err = RustfmtToolchain::with_binary("/nonexistent/rustfmt")
            .check(Path::new("T.rs"), "struct T;", "T")
            .await
            .unwrap_err();
        assert!(matches!(err, TupleGenError::Toolchain(_)));
    }
}
