//! Error types for sqlbind

use thiserror::Error;

/// Result type alias for sqlbind operations
pub type BindResult<T> = Result<T, BindError>;

/// Error types for binding, rewriting and execution.
///
/// Tokenizing and `VALUES` expansion never fail; everything else surfaces here.
#[derive(Debug, Error)]
pub enum BindError {
    /// A named parameter has no matching field or map key.
    #[error("could not find name '{name}' in {target}")]
    NameNotFound { name: String, target: String },

    /// The bind argument is neither record-like nor map-like.
    #[error("unsupported bind argument: {0}")]
    UnsupportedArgument(String),

    /// A slice argument was empty, which would render `IN ()`.
    #[error("empty slice passed to 'in' query (argument {position})")]
    EmptySlice { position: usize },

    /// The query has more `?` placeholders than arguments.
    #[error("number of bindVars exceeds arguments ({placeholders} placeholders, {arguments} arguments)")]
    TooManyPlaceholders {
        placeholders: usize,
        arguments: usize,
    },

    /// More arguments were supplied than `?` placeholders consumed.
    #[error("number of bindVars less than number arguments ({placeholders} placeholders, {arguments} arguments)")]
    TooManyArguments {
        placeholders: usize,
        arguments: usize,
    },

    /// Query execution error
    #[cfg(feature = "postgres")]
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Driver error from a non-Postgres executor
    #[error("Driver error: {0}")]
    Driver(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// A migration failed and its transaction was rolled back.
    #[error("Migration '{name}' failed: {message}")]
    Migration { name: String, message: String },

    /// Template expansion error
    #[error("Template error: {0}")]
    Template(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl BindError {
    /// Create a name-not-found error for `target` (a type or map description).
    pub fn name_not_found(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::NameNotFound {
            name: name.into(),
            target: target.into(),
        }
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a migration error
    pub fn migration(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Migration {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Check if this is a missing-name error
    pub fn is_name_not_found(&self) -> bool {
        matches!(self, Self::NameNotFound { .. })
    }

    /// Check if this error came from slice expansion
    pub fn is_slice_error(&self) -> bool {
        matches!(
            self,
            Self::EmptySlice { .. }
                | Self::TooManyPlaceholders { .. }
                | Self::TooManyArguments { .. }
        )
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for BindError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

impl From<tinytemplate::error::Error> for BindError {
    fn from(err: tinytemplate::error::Error) -> Self {
        Self::Template(err.to_string())
    }
}
