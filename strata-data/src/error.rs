use crate::query::QueryError;

/// Errors that can occur in the data layer.
#[derive(Debug)]
pub enum DataError {
    /// A record addressed by primary key no longer exists.
    NotFound(String),
    /// A single-record lookup matched more than one record.
    MultipleResults { table: &'static str },
    /// A non-optional field was absent from the values used to build a model.
    MissingField { table: &'static str, field: String },
    /// A value could not be converted to the field's type.
    InvalidValue {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    /// A primary key whose arity does not match the model's key columns.
    InvalidKey {
        table: &'static str,
        expected: usize,
        found: usize,
    },
    /// A uniqueness, foreign-key or check constraint was violated.
    Constraint(String),
    /// The query could not be rendered.
    Query(QueryError),
    /// The database handle was used before `init`.
    Uninitialized,
    Database(Box<dyn std::error::Error + Send + Sync>),
    Other(String),
}

impl DataError {
    /// Construct a `Database` variant from any error type.
    ///
    /// Used by backend crates (e.g. `strata-data-sqlx`) to wrap
    /// driver-specific errors.
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        DataError::Database(Box::new(err))
    }

    /// Whether this error means "the addressed record does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(self, DataError::NotFound(_))
    }
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::NotFound(msg) => write!(f, "Not found: {msg}"),
            DataError::MultipleResults { table } => {
                write!(f, "Multiple rows found in '{table}' where at most one was expected")
            }
            DataError::MissingField { table, field } => {
                write!(f, "Missing field '{field}' for '{table}'")
            }
            DataError::InvalidValue {
                field,
                expected,
                found,
            } => write!(f, "Invalid value for '{field}': expected {expected}, found {found}"),
            DataError::InvalidKey {
                table,
                expected,
                found,
            } => write!(
                f,
                "Invalid key for '{table}': expected {expected} column(s), got {found}"
            ),
            DataError::Constraint(msg) => write!(f, "Constraint violation: {msg}"),
            DataError::Query(err) => write!(f, "Query error: {err}"),
            DataError::Uninitialized => {
                write!(f, "Database uninitialized. Call `Database::init` first")
            }
            DataError::Database(err) => write!(f, "Database error: {err}"),
            DataError::Other(msg) => write!(f, "Data error: {msg}"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Database(err) => Some(err.as_ref()),
            DataError::Query(err) => Some(err),
            _ => None,
        }
    }
}

impl From<QueryError> for DataError {
    fn from(err: QueryError) -> Self {
        DataError::Query(err)
    }
}
