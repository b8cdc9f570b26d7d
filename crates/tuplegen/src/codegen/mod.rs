//! Record type specification and source generation.
//!
//! - [`probe`]: column descriptors from live queries and tables
//! - [`spec`]: [`TypeSpec`] and the editing [`TypeSpecBuilder`]
//! - [`diff`]: added/removed/retained columns between versions
//! - [`reconcile`]: the reconciliation mapping as data
//! - [`statement`]: defined queries and updates
//! - [`synth`]: Rust source rendering

pub mod diff;
pub mod probe;
pub mod reconcile;
pub mod spec;
pub mod statement;
pub mod synth;

pub use diff::{RetainedColumn, SpecDiff};
pub use probe::SchemaProbe;
pub use reconcile::{FieldPlan, FieldSource, ReconcilePlan};
pub use spec::{BuiltSpec, Evolution, TypeSpec, TypeSpecBuilder};
pub use statement::{StatementKind, StatementSpec, TableWrites};
pub use synth::{SourceSynthesizer, SynthesizedSource, SynthesizedStatement};
