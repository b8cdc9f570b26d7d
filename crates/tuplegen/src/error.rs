//! Error types for the tuplegen library.

use thiserror::Error;

use crate::core::SemanticType;
use crate::messages::Msg;

/// Main error type for tuplegen operations.
#[derive(Error, Debug)]
pub enum TupleGenError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A query shape or table definition could not be introspected.
    #[error("Probe of {target} failed: {message}")]
    Probe { target: String, message: String },

    /// A column was added twice to the same specification.
    #[error("Attempt to add duplicate attribute {name} of type {semantic_type} to {type_name}")]
    DuplicateAttribute {
        type_name: String,
        name: String,
        semantic_type: SemanticType,
    },

    /// A column that does not exist was removed or edited.
    #[error("Attempt to remove non-existent attribute {name} from {type_name}")]
    UnknownAttribute { type_name: String, name: String },

    /// A retained column changed to a type with no defined conversion.
    #[error("Column {column} of {type_name} cannot be converted from {from} to {to}")]
    IncompatibleRetype {
        type_name: String,
        column: String,
        from: SemanticType,
        to: SemanticType,
    },

    /// A built artifact is missing or inconsistent with its source.
    #[error("Failed to load {name}: {message}")]
    Load { name: String, message: String },

    /// Invalid type, namespace or column name.
    #[error("Invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// Record values do not fit the shape of their type.
    #[error("Record error in {type_name}: {message}")]
    Record { type_name: String, message: String },

    /// The build toolchain is unavailable or the output location is unusable.
    #[error("Toolchain error: {0}")]
    Toolchain(String),

    /// Table has no primary key (required for keyed updates)
    #[error("Table {0} has no primary key - keyed updates require primary keys")]
    NoPrimaryKey(String),

    /// Transaction lifecycle failure (begin/commit/rollback state).
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// The persisted version record cannot be interpreted.
    #[error("Version indeterminate: {0}")]
    VersionIndeterminate(String),

    /// A migration step failed; only `applied` steps are committed.
    #[error("Migration step {step} ({description}) failed; database remains at version {applied}")]
    Migration {
        step: usize,
        description: String,
        applied: u64,
        #[source]
        source: Box<TupleGenError>,
    },

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// PostgreSQL connection or statement error
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// SQLite connection or statement error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TupleGenError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl Into<String>, context: impl Into<String>) -> Self {
        TupleGenError::Pool {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Create a Probe error for a query or table.
    pub fn probe(target: impl Into<String>, message: impl ToString) -> Self {
        TupleGenError::Probe {
            target: target.into(),
            message: message.to_string(),
        }
    }

    /// Create a Load error.
    pub fn load(name: impl Into<String>, message: impl Into<String>) -> Self {
        TupleGenError::Load {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a Record error.
    pub fn record(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        TupleGenError::Record {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Create an InvalidName error.
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        TupleGenError::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error came from the database driver.
    pub fn is_database_error(&self) -> bool {
        matches!(
            self,
            TupleGenError::Postgres(_)
                | TupleGenError::Sqlite(_)
                | TupleGenError::Pool { .. }
                | TupleGenError::Transaction(_)
        )
    }

    /// Message table entry describing this error kind.
    pub fn kind(&self) -> Msg {
        match self {
            TupleGenError::Config(_) | TupleGenError::Yaml(_) => Msg::ConfigInvalid,
            TupleGenError::Probe { .. } => Msg::ProbeFailed,
            TupleGenError::DuplicateAttribute { .. } => Msg::DuplicateAttribute,
            TupleGenError::UnknownAttribute { .. } => Msg::UnknownAttribute,
            TupleGenError::IncompatibleRetype { .. } => Msg::IncompatibleRetype,
            TupleGenError::Load { .. } => Msg::LoadFailed,
            TupleGenError::InvalidName { .. } => Msg::InvalidName,
            TupleGenError::Record { .. } | TupleGenError::NoPrimaryKey(_) => Msg::RecordShape,
            TupleGenError::Toolchain(_) => Msg::ToolchainUnavailable,
            TupleGenError::VersionIndeterminate(_) => Msg::VersionIndeterminate,
            TupleGenError::Migration { .. } => Msg::MigrationFailed,
            TupleGenError::Postgres(_)
            | TupleGenError::Sqlite(_)
            | TupleGenError::Pool { .. }
            | TupleGenError::Transaction(_) => Msg::TransactionFailed,
            TupleGenError::Io(_) | TupleGenError::Json(_) => Msg::IoFailed,
        }
    }

    /// Stable error code, e.g. `TG-0301`.
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// Process exit code used by the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            TupleGenError::Config(_) | TupleGenError::Yaml(_) => 2,
            TupleGenError::Probe { .. } => 3,
            TupleGenError::Postgres(_)
            | TupleGenError::Sqlite(_)
            | TupleGenError::Pool { .. }
            | TupleGenError::Transaction(_) => 4,
            TupleGenError::Migration { .. } | TupleGenError::VersionIndeterminate(_) => 5,
            TupleGenError::Load { .. } | TupleGenError::Toolchain(_) => 6,
            TupleGenError::DuplicateAttribute { .. }
            | TupleGenError::UnknownAttribute { .. }
            | TupleGenError::IncompatibleRetype { .. }
            | TupleGenError::InvalidName { .. }
            | TupleGenError::Record { .. }
            | TupleGenError::NoPrimaryKey(_) => 7,
            TupleGenError::Io(_) | TupleGenError::Json(_) => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error [{}]: {}\n", self.code(), self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for tuplegen operations.
pub type Result<T> = std::result::Result<T, TupleGenError>;
