use crate::db::schema::refresh_tokens;
use chrono::{DateTime, Utc};
use diesel::{Insertable, Queryable, Selectable};
use uuid::Uuid;

/// Persisted refresh token. Only the SHA-256 digest of the raw value is stored.
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = refresh_tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub token_hash: String,
    pub device_id: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Usable at `now`: strictly before `expires_at`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Values the store needs to mint the token that replaces a consumed one.
/// User and session are inherited from the consumed row.
#[derive(Debug, Clone)]
pub struct Replacement {
    pub token_hash: String,
    pub device_id: Option<String>,
    pub expires_at: DateTime<Utc>,
}
