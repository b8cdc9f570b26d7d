//! Core abstractions shared across the crate.
//!
//! - [`semantic`]: portable value kinds and the retype conversion matrix
//! - [`value`]: owned SQL values
//! - [`schema`]: column descriptors produced by probes
//! - [`identifier`]: SQL and Rust name validation
//! - [`traits`]: the [`Dialect`] strategy

pub mod identifier;
pub mod schema;
pub mod semantic;
pub mod traits;
pub mod value;

pub use schema::ColumnDescriptor;
pub use semantic::{Conversion, SemanticType};
pub use traits::Dialect;
pub use value::SqlValue;
