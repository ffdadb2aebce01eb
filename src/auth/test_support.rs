//! Fixtures shared by the auth and router tests.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use doccontrol_auth_api::Role;
use uuid::Uuid;

use crate::auth::refresh_tokens::RefreshTokenStore;
use crate::clock::{Clock, ManualClock};
use crate::db::memory::InMemoryStore;
use crate::db::models::session::Session;
use crate::db::models::user::User;

pub fn token_store(
    ttl: Duration,
    stale_after: Duration,
) -> (RefreshTokenStore, Arc<InMemoryStore>, Arc<ManualClock>) {
    let memory = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let tokens = RefreshTokenStore::new(memory.clone(), clock.clone(), ttl, stale_after);
    (tokens, memory, clock)
}

/// Session row that is not stored yet. Pass it to `RefreshTokenStore::create`.
pub fn session(user_id: Uuid, expires_at: DateTime<Utc>) -> Session {
    Session {
        id: Uuid::new_v4(),
        user_id,
        device_id: None,
        user_agent: None,
        ip_address: None,
        expires_at,
        created_at: expires_at - Duration::days(30),
    }
}

pub fn user(email: &str, password_hash: &str, role: Role, clock: &dyn Clock) -> User {
    let now = clock.now();
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        username: email.split('@').next().unwrap_or(email).to_string(),
        password_hash: Some(password_hash.to_string()),
        role: role.as_str().to_string(),
        is_active: true,
        created_at: now,
        updated_at: now,
        last_login_at: None,
    }
}
