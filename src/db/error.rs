use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// Failures of a storage call. Lookups report absence as `Ok(None)`, so
/// there is no not-found variant.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),
    #[error("Foreign key constraint violation: {0}")]
    ForeignKeyViolation(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl From<DieselError> for RepositoryError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                RepositoryError::UniqueViolation(info.message().to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                RepositoryError::ForeignKeyViolation(info.message().to_string())
            }
            DieselError::DatabaseError(_, info) => {
                RepositoryError::Database(info.message().to_string())
            }
            other => RepositoryError::Database(other.to_string()),
        }
    }
}
