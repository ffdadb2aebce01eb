use crate::db::DbPool;
use crate::db::connection::with_connection;
use crate::db::error::RepositoryError;
use crate::db::models::user::User;
use crate::db::schema::users;
use crate::db::store::UserStore;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

/// Read side of the user directory backed by Postgres.
pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl UserStore for UserRepository {
    fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        with_connection(&self.pool, |conn| {
            users::table
                .filter(users::email.eq(email))
                .select(User::as_select())
                .first::<User>(conn)
                .optional()
                .map_err(Into::into)
        })
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        with_connection(&self.pool, |conn| {
            users::table
                .find(id)
                .select(User::as_select())
                .first::<User>(conn)
                .optional()
                .map_err(Into::into)
        })
    }

    fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        with_connection(&self.pool, |conn| {
            diesel::update(users::table.find(id))
                .set((users::last_login_at.eq(Some(at)), users::updated_at.eq(at)))
                .execute(conn)?;
            Ok(())
        })
    }
}
