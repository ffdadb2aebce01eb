use crate::db::DbPool;
use crate::db::connection::with_connection;
use crate::db::error::RepositoryError;
use crate::db::models::refresh_token::{RefreshToken, Replacement};
use crate::db::models::session::{RevokedCounts, Session};
use crate::db::schema::{refresh_tokens, sessions};
use crate::db::store::TokenStore;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

/// Sessions and refresh tokens in Postgres.
///
/// Lock order is always session row first, then token rows. Rotation and
/// both logout paths follow it, so they serialize on the session instead of
/// deadlocking.
pub struct RefreshTokenRepository {
    pool: DbPool,
}

impl RefreshTokenRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn count(rows: usize) -> u64 {
    u64::try_from(rows).unwrap_or(u64::MAX)
}

impl TokenStore for RefreshTokenRepository {
    fn insert_session(
        &self,
        session: &Session,
        first_token: &RefreshToken,
    ) -> Result<(), RepositoryError> {
        with_connection(&self.pool, |conn| {
            conn.transaction::<_, RepositoryError, _>(|conn| {
                diesel::insert_into(sessions::table)
                    .values(session)
                    .execute(conn)?;
                diesel::insert_into(refresh_tokens::table)
                    .values(first_token)
                    .execute(conn)?;
                Ok(())
            })
        })
    }

    fn rotate_refresh_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
        replacement: Replacement,
    ) -> Result<Option<RefreshToken>, RepositoryError> {
        with_connection(&self.pool, |conn| {
            conn.transaction::<_, RepositoryError, _>(|conn| {
                let Some(current) = refresh_tokens::table
                    .filter(refresh_tokens::token_hash.eq(token_hash))
                    .filter(refresh_tokens::expires_at.gt(now))
                    .select(RefreshToken::as_select())
                    .first::<RefreshToken>(conn)
                    .optional()?
                else {
                    return Ok(None);
                };

                let session = sessions::table
                    .find(current.session_id)
                    .select(sessions::id)
                    .for_update()
                    .first::<Uuid>(conn)
                    .optional()?;
                if session.is_none() {
                    return Ok(None);
                }

                // Conditional delete: a concurrent rotation that got here first leaves 0 rows
                let consumed = diesel::delete(
                    refresh_tokens::table
                        .filter(refresh_tokens::id.eq(current.id))
                        .filter(refresh_tokens::expires_at.gt(now)),
                )
                .execute(conn)?;
                if consumed == 0 {
                    return Ok(None);
                }

                let next = RefreshToken {
                    id: Uuid::new_v4(),
                    user_id: current.user_id,
                    session_id: current.session_id,
                    token_hash: replacement.token_hash,
                    device_id: replacement.device_id.or(current.device_id),
                    expires_at: replacement.expires_at,
                    created_at: now,
                };

                diesel::insert_into(refresh_tokens::table)
                    .values(&next)
                    .execute(conn)?;
                diesel::update(sessions::table.find(next.session_id))
                    .set((
                        sessions::expires_at.eq(next.expires_at),
                        sessions::device_id.eq(&next.device_id),
                    ))
                    .execute(conn)?;

                Ok(Some(next))
            })
        })
    }

    fn delete_refresh_token(&self, token_hash: &str) -> Result<u64, RepositoryError> {
        with_connection(&self.pool, |conn| {
            let deleted = diesel::delete(
                refresh_tokens::table.filter(refresh_tokens::token_hash.eq(token_hash)),
            )
            .execute(conn)?;
            Ok(count(deleted))
        })
    }

    fn delete_session(&self, session_id: Uuid) -> Result<RevokedCounts, RepositoryError> {
        with_connection(&self.pool, |conn| {
            conn.transaction::<_, RepositoryError, _>(|conn| {
                sessions::table
                    .find(session_id)
                    .select(sessions::id)
                    .for_update()
                    .load::<Uuid>(conn)?;

                let refresh_tokens = diesel::delete(
                    refresh_tokens::table.filter(refresh_tokens::session_id.eq(session_id)),
                )
                .execute(conn)?;
                let sessions = diesel::delete(sessions::table.find(session_id)).execute(conn)?;

                Ok(RevokedCounts {
                    refresh_tokens: count(refresh_tokens),
                    sessions: count(sessions),
                })
            })
        })
    }

    fn delete_all_for_user(&self, user_id: Uuid) -> Result<RevokedCounts, RepositoryError> {
        with_connection(&self.pool, |conn| {
            conn.transaction::<_, RepositoryError, _>(|conn| {
                sessions::table
                    .filter(sessions::user_id.eq(user_id))
                    .select(sessions::id)
                    .for_update()
                    .load::<Uuid>(conn)?;

                let refresh_tokens = diesel::delete(
                    refresh_tokens::table.filter(refresh_tokens::user_id.eq(user_id)),
                )
                .execute(conn)?;
                let sessions =
                    diesel::delete(sessions::table.filter(sessions::user_id.eq(user_id)))
                        .execute(conn)?;

                Ok(RevokedCounts {
                    refresh_tokens: count(refresh_tokens),
                    sessions: count(sessions),
                })
            })
        })
    }

    fn delete_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        with_connection(&self.pool, |conn| {
            let deleted =
                diesel::delete(refresh_tokens::table.filter(refresh_tokens::expires_at.lt(now)))
                    .execute(conn)?;
            Ok(count(deleted))
        })
    }

    fn delete_refresh_tokens_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        with_connection(&self.pool, |conn| {
            let deleted =
                diesel::delete(refresh_tokens::table.filter(refresh_tokens::created_at.lt(cutoff)))
                    .execute(conn)?;
            Ok(count(deleted))
        })
    }

    fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        // refresh_tokens.session_id cascades on delete
        with_connection(&self.pool, |conn| {
            let deleted = diesel::delete(sessions::table.filter(sessions::expires_at.lt(now)))
                .execute(conn)?;
            Ok(count(deleted))
        })
    }
}
