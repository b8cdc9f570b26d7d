//! PostgreSQL driver.
//!
//! - [`PostgresDialect`]: SQL syntax strategy and native type table
//! - [`PgPool`] / [`PgSession`]: deadpool-managed connections
//! - `types`: [`SqlValue`](crate::core::SqlValue) encoding and row decoding

mod dialect;
mod session;
mod types;

pub use dialect::PostgresDialect;
pub use session::{PgPool, PgSession};
