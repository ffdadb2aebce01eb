use super::{DbConnection, DbPool};
use crate::db::error::RepositoryError;
use anyhow::{Context, Result};
use diesel::PgConnection;
use diesel::r2d2::ConnectionManager;

/// Builds the r2d2 pool used by the diesel repositories.
pub fn create_pool(database_url: &str, max_size: u32) -> Result<DbPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);

    diesel::r2d2::Pool::builder()
        .max_size(max_size)
        .build(manager)
        .context("Failed to create database pool")
}

pub fn get_connection(pool: &DbPool) -> Result<DbConnection, RepositoryError> {
    pool.get().map_err(RepositoryError::from)
}

/// Runs `f` on a pooled connection.
pub fn with_connection<T>(
    pool: &DbPool,
    f: impl FnOnce(&mut PgConnection) -> Result<T, RepositoryError>,
) -> Result<T, RepositoryError> {
    let mut pooled = get_connection(pool)?;
    f(&mut *pooled)
}
