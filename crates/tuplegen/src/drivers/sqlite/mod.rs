//! SQLite driver.
//!
//! - [`SqliteDialect`]: SQL syntax strategy and declared type table
//! - [`SqlitePool`] / [`SqliteSession`]: sqlx-managed connections

mod dialect;
mod session;
mod types;

pub use dialect::SqliteDialect;
pub use session::{SqlitePool, SqliteSession};
