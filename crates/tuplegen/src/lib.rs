//! # tuplegen
//!
//! Record types synthesized from live database schemas, loaded at run time,
//! plus transactional schema versioning.
//!
//! This library provides:
//!
//! - **Schema probes** that describe a query's result shape or a table
//! - **Source synthesis** of plain Rust structs from column descriptors
//! - **Versioned evolution** with a generated reconciliation from the previous shape
//! - **Hot loading** where every load is an independent, generation-numbered handle
//! - **Scoped transactions** with keyed update and delete of fetched records
//! - **Schema migrations** applied in order, one transaction per step
//! - **Defined statements** with typed query, update and keyed write accessors
//!
//! ## Example
//!
//! ```rust,no_run
//! use tuplegen::{Config, ConnectionManager, TypeFactory};
//!
//! #[tokio::main]
//! async fn main() -> tuplegen::Result<()> {
//!     let config = Config::load("tuplegen.yaml")?;
//!     let db = ConnectionManager::connect(&config.database).await?;
//!     let factory = TypeFactory::new(db.clone(), &config.codegen);
//!
//!     factory.generate_from_query("Order", "SELECT id, total FROM $$orders").await?;
//!     let order = factory.load("Order").await?;
//!     db.query_records(&order, "SELECT id, total FROM $$orders", &[], |record| {
//!         println!("{}", record);
//!         Ok(())
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```

pub mod build;
pub mod codegen;
pub mod config;
pub mod core;
pub mod db;
pub mod dialect;
pub mod drivers;
pub mod error;
pub mod factory;
pub mod loader;
pub mod messages;
pub mod record;
pub mod version;

// Generated sources name chrono through this crate.
pub use chrono;

// Re-exports for convenient access
pub use build::{BuildBridge, CompiledArtifact, CompiledStatement, Toolchain, ToolchainReport};
pub use codegen::{
    ReconcilePlan, SchemaProbe, SourceSynthesizer, SpecDiff, StatementSpec, TypeSpec, TypeSpecBuilder,
};
pub use config::{CodegenConfig, Config, DatabaseConfig, DialectKind, ToolchainKind, VersioningConfig};
pub use core::{ColumnDescriptor, Conversion, SemanticType, SqlValue};
pub use db::{ConnectionManager, Transaction};
pub use error::{Result, TupleGenError};
pub use factory::TypeFactory;
pub use loader::{DynamicLoader, LoadedType, TypeRegistry};
pub use record::{KeyedRecord, Record, Tuple};
pub use version::{MigrationOutcome, MigrationStep, ProgressIndicator, SchemaVersionEngine};
