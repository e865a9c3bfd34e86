use strata_data::DataError;

/// Extension trait for converting `sqlx::Error` into `DataError`.
///
/// Due to Rust's orphan rules, we can't implement `From<sqlx::Error> for DataError`
/// in this crate. Instead, use `.into_data_error()` or `map_err(SqlxErrorExt::into_data_error)`.
pub trait SqlxErrorExt {
    fn into_data_error(self) -> DataError;
}

impl SqlxErrorExt for sqlx::Error {
    fn into_data_error(self) -> DataError {
        match &self {
            sqlx::Error::RowNotFound => DataError::NotFound("Row not found".into()),
            sqlx::Error::Database(db) if is_constraint(db.kind()) => {
                DataError::Constraint(db.message().to_string())
            }
            _ => DataError::database(self),
        }
    }
}

fn is_constraint(kind: sqlx::error::ErrorKind) -> bool {
    use sqlx::error::ErrorKind;
    matches!(
        kind,
        ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation
    )
}

/// Convenience alias for data-layer results using `DataError`.
pub type SqlxResult<T> = Result<T, DataError>;
