//! Process-local implementation of both storage seams.
//!
//! One mutex guards every table, so each trait method is trivially atomic
//! with respect to every other. State is lost on restart and is not shared
//! between instances.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::db::error::RepositoryError;
use crate::db::models::refresh_token::{RefreshToken, Replacement};
use crate::db::models::session::{RevokedCounts, Session};
use crate::db::models::user::User;
use crate::db::store::{TokenStore, UserStore};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    sessions: HashMap<Uuid, Session>,
    /// Keyed by token digest
    refresh_tokens: HashMap<String, RefreshToken>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

fn count(rows: usize) -> u64 {
    u64::try_from(rows).unwrap_or(u64::MAX)
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: User) {
        self.tables.lock().users.insert(user.id, user);
    }

    #[cfg(test)]
    pub fn set_user_active(&self, id: Uuid, active: bool) {
        if let Some(user) = self.tables.lock().users.get_mut(&id) {
            user.is_active = active;
        }
    }

    #[cfg(test)]
    pub fn refresh_tokens_for_user(&self, user_id: Uuid) -> Vec<RefreshToken> {
        self.tables
            .lock()
            .refresh_tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    #[cfg(test)]
    pub fn sessions_for_user(&self, user_id: Uuid) -> Vec<Session> {
        self.tables
            .lock()
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }
}

impl UserStore for InMemoryStore {
    fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self.tables.lock().users.get(&id).cloned())
    }

    fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        if let Some(user) = self.tables.lock().users.get_mut(&id) {
            user.last_login_at = Some(at);
            user.updated_at = at;
        }
        Ok(())
    }
}

impl TokenStore for InMemoryStore {
    fn insert_session(
        &self,
        session: &Session,
        first_token: &RefreshToken,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock();
        if tables.sessions.contains_key(&session.id) {
            return Err(RepositoryError::UniqueViolation(format!(
                "session {} already exists",
                session.id
            )));
        }
        if first_token.session_id != session.id {
            return Err(RepositoryError::ForeignKeyViolation(format!(
                "session {} does not exist",
                first_token.session_id
            )));
        }
        if tables.refresh_tokens.contains_key(&first_token.token_hash) {
            return Err(RepositoryError::UniqueViolation(
                "refresh token hash already exists".to_string(),
            ));
        }
        tables.sessions.insert(session.id, session.clone());
        tables
            .refresh_tokens
            .insert(first_token.token_hash.clone(), first_token.clone());
        Ok(())
    }

    fn rotate_refresh_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
        replacement: Replacement,
    ) -> Result<Option<RefreshToken>, RepositoryError> {
        let mut tables = self.tables.lock();

        let Some(current) = tables.refresh_tokens.get(token_hash) else {
            return Ok(None);
        };
        if !current.is_live_at(now) || !tables.sessions.contains_key(&current.session_id) {
            return Ok(None);
        }
        let Some(current) = tables.refresh_tokens.remove(token_hash) else {
            return Ok(None);
        };

        let next = RefreshToken {
            id: Uuid::new_v4(),
            user_id: current.user_id,
            session_id: current.session_id,
            token_hash: replacement.token_hash,
            device_id: replacement.device_id.or(current.device_id),
            expires_at: replacement.expires_at,
            created_at: now,
        };

        if let Some(session) = tables.sessions.get_mut(&next.session_id) {
            session.expires_at = next.expires_at;
            session.device_id.clone_from(&next.device_id);
        }
        tables
            .refresh_tokens
            .insert(next.token_hash.clone(), next.clone());

        Ok(Some(next))
    }

    fn delete_refresh_token(&self, token_hash: &str) -> Result<u64, RepositoryError> {
        let removed = self.tables.lock().refresh_tokens.remove(token_hash);
        Ok(u64::from(removed.is_some()))
    }

    fn delete_session(&self, session_id: Uuid) -> Result<RevokedCounts, RepositoryError> {
        let mut tables = self.tables.lock();
        let before = tables.refresh_tokens.len();
        tables
            .refresh_tokens
            .retain(|_, t| t.session_id != session_id);
        let refresh_tokens = count(before - tables.refresh_tokens.len());
        let sessions = u64::from(tables.sessions.remove(&session_id).is_some());

        Ok(RevokedCounts {
            refresh_tokens,
            sessions,
        })
    }

    fn delete_all_for_user(&self, user_id: Uuid) -> Result<RevokedCounts, RepositoryError> {
        let mut tables = self.tables.lock();

        let tokens_before = tables.refresh_tokens.len();
        tables.refresh_tokens.retain(|_, t| t.user_id != user_id);
        let sessions_before = tables.sessions.len();
        tables.sessions.retain(|_, s| s.user_id != user_id);

        Ok(RevokedCounts {
            refresh_tokens: count(tokens_before - tables.refresh_tokens.len()),
            sessions: count(sessions_before - tables.sessions.len()),
        })
    }

    fn delete_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut tables = self.tables.lock();
        let before = tables.refresh_tokens.len();
        tables.refresh_tokens.retain(|_, t| t.expires_at >= now);
        Ok(count(before - tables.refresh_tokens.len()))
    }

    fn delete_refresh_tokens_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut tables = self.tables.lock();
        let before = tables.refresh_tokens.len();
        tables.refresh_tokens.retain(|_, t| t.created_at >= cutoff);
        Ok(count(before - tables.refresh_tokens.len()))
    }

    fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut tables = self.tables.lock();
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| s.expires_at >= now);
        let Tables {
            sessions,
            refresh_tokens,
            ..
        } = &mut *tables;
        refresh_tokens.retain(|_, t| sessions.contains_key(&t.session_id));
        Ok(count(before - sessions.len()))
    }
}
