//! Storage seams consumed by the auth core.
//!
//! `TokenStore` owns the only mutable shared state of the service (sessions
//! and refresh tokens). Every method is individually atomic; the auth core
//! never composes two calls where a concurrent caller could observe a
//! half-applied change.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::error::RepositoryError;
use crate::db::models::refresh_token::{RefreshToken, Replacement};
use crate::db::models::session::{RevokedCounts, Session};
use crate::db::models::user::User;

/// Black-box user directory.
pub trait UserStore: Send + Sync {
    fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;

    fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError>;
}

pub trait TokenStore: Send + Sync {
    /// Stores a new session together with its first refresh token. Either
    /// both rows exist afterwards or neither does.
    fn insert_session(
        &self,
        session: &Session,
        first_token: &RefreshToken,
    ) -> Result<(), RepositoryError>;

    /// Consumes the token whose digest is `token_hash` and stores its
    /// replacement in one step. The owning session takes over the new expiry
    /// and the replacement's device.
    ///
    /// Returns `Ok(None)` when the token is unknown, expired at `now`, already
    /// consumed, or its session no longer exists. Of two concurrent calls with
    /// the same digest at most one gets `Some`.
    fn rotate_refresh_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
        replacement: Replacement,
    ) -> Result<Option<RefreshToken>, RepositoryError>;

    /// Number of rows removed (0 when already gone).
    fn delete_refresh_token(&self, token_hash: &str) -> Result<u64, RepositoryError>;

    /// Removes the session and every refresh token bound to it.
    fn delete_session(&self, session_id: Uuid) -> Result<RevokedCounts, RepositoryError>;

    /// Removes every session and refresh token of the user.
    fn delete_all_for_user(&self, user_id: Uuid) -> Result<RevokedCounts, RepositoryError>;

    fn delete_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError>;

    fn delete_refresh_tokens_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;

    /// Removes expired sessions along with any tokens still bound to them.
    fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError>;
}
