//! Migration steps supplied by the application.

use std::fmt;

use futures::future::BoxFuture;

use crate::db::Transaction;
use crate::error::Result;

type ApplyFn = Box<dyn for<'t> Fn(&'t mut Transaction) -> BoxFuture<'t, Result<()>> + Send + Sync>;

/// One unit of structural change, applied at most once.
///
/// A step's ordinal is its position in the sequence handed to
/// [`SchemaVersionEngine::migrate`](super::SchemaVersionEngine::migrate).
pub struct MigrationStep {
    description: String,
    apply: ApplyFn,
}

impl MigrationStep {
    /// Step running `apply` inside the step's transaction.
    ///
    /// ```ignore
    /// MigrationStep::new("backfill totals", |tx| {
    ///     Box::pin(async move {
    ///         tx.execute("UPDATE $$orders SET total = 0 WHERE total IS NULL", &[]).await?;
    ///         Ok(())
    ///     })
    /// })
    /// ```
    pub fn new<F>(description: impl Into<String>, apply: F) -> Self
    where
        F: for<'t> Fn(&'t mut Transaction) -> BoxFuture<'t, Result<()>> + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            apply: Box::new(apply),
        }
    }

    /// Step executing `statements` in order.
    pub fn sql<I, S>(description: impl Into<String>, statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let statements: Vec<String> = statements.into_iter().map(Into::into).collect();
        Self::new(description, move |tx| {
            let statements = statements.clone();
            Box::pin(async move {
                for statement in &statements {
                    tx.execute(statement, &[]).await?;
                }
                Ok(())
            })
        })
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub(crate) fn apply<'t>(&self, tx: &'t mut Transaction) -> BoxFuture<'t, Result<()>> {
        (self.apply)(tx)
    }
}

impl fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
