//! Dialect support shared by the drivers.
//!
//! - [`typemap`]: native type name to semantic type tables
//! - [`sql`]: table prefix substitution, placeholder rendering and script
//!   splitting
//!
//! The dialect implementations themselves live with their drivers in
//! `drivers/postgres` and `drivers/sqlite`.

pub mod sql;
pub mod typemap;

pub use sql::{count_placeholders, replace_table_prefix, rewrite_placeholders, split_statements};
pub use typemap::{normalize_native, TypeMapTable};
