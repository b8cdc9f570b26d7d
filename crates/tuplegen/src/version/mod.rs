//! Ordered, transactional schema migrations.
//!
//! The database records how many steps of the application's migration
//! sequence have been applied in a one-row version table:
//!
//! ```sql
//! CREATE TABLE $$version (
//!     app_version INTEGER NOT NULL,       -- applied step count
//!     framework_version INTEGER NOT NULL  -- layout of this table
//! )
//! ```
//!
//! Each step runs in its own transaction together with the update of
//! `app_version`, so the count always equals the index of the next
//! unapplied step. A failed step is rolled back and stops the run.
//!
//! Two processes migrating the same database at once are not coordinated
//! here. Deployments that start several instances together need an
//! external lock around `migrate`.

mod progress;
mod step;

pub use progress::{LogProgress, NoProgress, ProgressIndicator};
pub use step::MigrationStep;

use std::fmt::Display;

use tracing::{info, warn};

use crate::config::VersioningConfig;
use crate::core::identifier::validate_identifier;
use crate::core::traits::Dialect;
use crate::core::SqlValue;
use crate::db::{ConnectionManager, Transaction};
use crate::dialect::replace_table_prefix;
use crate::error::{Result, TupleGenError};
use crate::messages::Msg;

/// Layout version of the version table written by this library.
pub const FRAMEWORK_VERSION: i64 = 1;

/// Result of a successful `migrate` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationOutcome {
    /// Applied step count before the run.
    pub previous: u64,
    /// Steps applied by this run.
    pub applied: u64,
    /// Applied step count after the run.
    pub current: u64,
}

/// Applies the unapplied suffix of a migration sequence.
pub struct SchemaVersionEngine {
    db: ConnectionManager,
    table: String,
}

impl SchemaVersionEngine {
    /// Engine using the default `$$version` table.
    pub fn new(db: ConnectionManager) -> Self {
        Self {
            db,
            table: VersioningConfig::default().table,
        }
    }

    pub fn from_config(db: ConnectionManager, config: &VersioningConfig) -> Result<Self> {
        Self::with_table(db, &config.table)
    }

    pub fn with_table(db: ConnectionManager, table: &str) -> Result<Self> {
        validate_identifier(table)?;
        Ok(Self {
            db,
            table: table.to_string(),
        })
    }

    /// Version table name with the table prefix applied.
    pub fn table(&self) -> String {
        replace_table_prefix(&self.table, self.db.table_prefix())
    }

    fn quoted_table(&self) -> Result<String> {
        self.db.dialect().quote_table(&self.table())
    }

    /// Applied step count, without creating anything. A database with no
    /// version table reports 0.
    pub async fn applied_step_count(&self) -> Result<u64> {
        if !self.db.table_exists(&self.table).await? {
            return Ok(0);
        }
        let rows = self.db.query_rows(&self.select_sql()?, &[]).await?;
        self.parse_version(&rows)
    }

    /// Apply every step at or past the persisted count, in order.
    pub async fn migrate(&self, steps: &[MigrationStep]) -> Result<MigrationOutcome> {
        self.migrate_with_progress(steps, &mut NoProgress).await
    }

    /// [`migrate`](Self::migrate), reporting each step to `progress`.
    pub async fn migrate_with_progress(
        &self,
        steps: &[MigrationStep],
        progress: &mut dyn ProgressIndicator,
    ) -> Result<MigrationOutcome> {
        self.ensure_version_table().await?;

        let rows = self.db.query_rows(&self.select_sql()?, &[]).await?;
        let previous = self.parse_version(&rows)?;
        let known = steps.len() as u64;
        if previous > known {
            return Err(TupleGenError::VersionIndeterminate(
                Msg::VersionAhead.format(&[&previous, &known]),
            ));
        }

        let start = previous as usize;
        progress.initialise(steps.len() - start);

        for (index, step) in steps.iter().enumerate().skip(start) {
            let target = index as u64 + 1;
            let updating = Msg::UpdatingTo.format(&[&target]);
            info!("{}: {}", updating, step.description());
            progress.step(index - start, &updating);

            if let Err(source) = self.apply_step(index as u64, step).await {
                return Err(TupleGenError::Migration {
                    step: index,
                    description: step.description().to_string(),
                    applied: index as u64,
                    source: Box::new(source),
                });
            }
            progress.step(index + 1 - start, &Msg::UpdatedTo.format(&[&target]));
        }

        if known > previous {
            info!("{}", Msg::UpdatedTo.format(&[&known]));
        }
        Ok(MigrationOutcome {
            previous,
            applied: known - previous,
            current: known,
        })
    }

    /// Run one step and advance the count in a single transaction.
    async fn apply_step(&self, index: u64, step: &MigrationStep) -> Result<()> {
        let select = self.select_sql()?;
        let update = format!("UPDATE {} SET app_version = ?", self.quoted_table()?);

        let mut tx = self.db.begin().await?;
        let result: Result<()> = async {
            let current = self.parse_version(&tx.query_rows(&select, &[]).await?)?;
            if current != index {
                return Err(TupleGenError::VersionIndeterminate(format!(
                    "{} moved to {} while step {} was pending",
                    self.table(),
                    current,
                    index
                )));
            }
            step.apply(&mut tx).await?;
            tx.execute(&update, &[SqlValue::I64(index as i64 + 1)]).await?;
            Ok(())
        }
        .await;

        finish(tx, result).await
    }

    /// Create the version table holding `(0, FRAMEWORK_VERSION)` when missing.
    async fn ensure_version_table(&self) -> Result<()> {
        if self.db.table_exists(&self.table).await? {
            return Ok(());
        }
        info!("{} {}", Msg::CreatingSchema.text(), self.table());

        let table = self.quoted_table()?;
        let create = format!(
            "CREATE TABLE IF NOT EXISTS {} (app_version INTEGER NOT NULL, framework_version INTEGER NOT NULL)",
            table
        );
        let insert = format!(
            "INSERT INTO {t} (app_version, framework_version) SELECT 0, {v} WHERE NOT EXISTS (SELECT 1 FROM {t})",
            t = table,
            v = FRAMEWORK_VERSION
        );

        let mut tx = self.db.begin().await?;
        let result: Result<()> = async {
            tx.execute(&create, &[]).await?;
            tx.execute(&insert, &[]).await?;
            Ok(())
        }
        .await;
        finish(tx, result).await
    }

    fn select_sql(&self) -> Result<String> {
        Ok(format!(
            "SELECT app_version, framework_version FROM {}",
            self.quoted_table()?
        ))
    }

    fn parse_version(&self, rows: &[Vec<SqlValue>]) -> Result<u64> {
        let table = self.table();
        let row = match rows {
            [] => return Err(indeterminate(Msg::VersionTableEmpty, &[&table])),
            [row] => row,
            _ => return Err(indeterminate(Msg::VersionTableRows, &[&table, &rows.len()])),
        };

        let framework = row
            .get(1)
            .and_then(SqlValue::as_i64)
            .ok_or_else(|| indeterminate(Msg::VersionTableInvalid, &[&table, &"framework_version"]))?;
        if framework > FRAMEWORK_VERSION {
            return Err(indeterminate(
                Msg::FrameworkTooNew,
                &[&table, &framework, &FRAMEWORK_VERSION],
            ));
        }

        row.first()
            .and_then(SqlValue::as_i64)
            .and_then(|v| u64::try_from(v).ok())
            .ok_or_else(|| indeterminate(Msg::VersionTableInvalid, &[&table, &"app_version"]))
    }
}

fn indeterminate(msg: Msg, args: &[&dyn Display]) -> TupleGenError {
    TupleGenError::VersionIndeterminate(msg.format(args))
}

/// Commit on success; otherwise roll back, log a failed rollback, and
/// return the original error.
async fn finish(tx: Transaction, result: Result<()>) -> Result<()> {
    match result {
        Ok(()) => tx.commit().await,
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Rollback failed after error ({}): {}", e, rollback_err);
            }
            Err(e)
        }
    }
}
