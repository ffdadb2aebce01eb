//! Lifecycle of opaque refresh tokens on top of a [`TokenStore`].
//!
//! Raw values leave this module exactly once, in the return value of
//! [`RefreshTokenStore::create`] or [`RefreshTokenStore::rotate`]; everything
//! persisted or looked up is the SHA-256 digest.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::auth::tokens::{generate_refresh_token, hash_token};
use crate::clock::Clock;
use crate::db::models::refresh_token::{RefreshToken, Replacement};
use crate::db::models::session::{RevokedCounts, Session};
use crate::db::store::TokenStore;
use crate::error::AppError;

/// A freshly minted refresh token. `token` is the raw value.
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted_expired_refresh_tokens: u64,
    pub deleted_old_refresh_tokens: u64,
    pub deleted_sessions: u64,
}

#[derive(Clone)]
pub struct RefreshTokenStore {
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    stale_after: Duration,
}

impl RefreshTokenStore {
    pub fn new(
        store: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        stale_after: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            ttl,
            stale_after,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Persists `session` together with its first token, attributed to the
    /// session's user and device. The token expires after the configured TTL.
    pub fn create(&self, session: &Session) -> Result<IssuedRefreshToken, AppError> {
        let now = self.clock.now();
        let raw = generate_refresh_token();
        let row = RefreshToken {
            id: Uuid::new_v4(),
            user_id: session.user_id,
            session_id: session.id,
            token_hash: hash_token(&raw),
            device_id: session.device_id.clone(),
            expires_at: now + self.ttl,
            created_at: now,
        };
        self.store.insert_session(session, &row)?;

        Ok(IssuedRefreshToken {
            token: raw,
            user_id: row.user_id,
            session_id: row.session_id,
            expires_at: row.expires_at,
        })
    }

    /// Consumes `old_token` and returns its replacement.
    ///
    /// Unknown, expired, already rotated and revoked tokens all fail with
    /// `InvalidRefreshToken`. Two concurrent calls with the same value never
    /// both succeed.
    pub fn rotate(
        &self,
        old_token: &str,
        device_id: Option<String>,
    ) -> Result<IssuedRefreshToken, AppError> {
        let now = self.clock.now();
        let raw = generate_refresh_token();
        let replacement = Replacement {
            token_hash: hash_token(&raw),
            device_id,
            expires_at: now + self.ttl,
        };

        let Some(row) = self
            .store
            .rotate_refresh_token(&hash_token(old_token), now, replacement)?
        else {
            tracing::warn!("Rejected refresh token (unknown, expired or already used)");
            return Err(AppError::InvalidRefreshToken);
        };

        tracing::debug!(user_id = %row.user_id, session_id = %row.session_id, "Refresh token rotated");
        Ok(IssuedRefreshToken {
            token: raw,
            user_id: row.user_id,
            session_id: row.session_id,
            expires_at: row.expires_at,
        })
    }

    /// Idempotent. Returns whether a token was actually removed.
    pub fn revoke(&self, token: &str) -> Result<bool, AppError> {
        Ok(self.store.delete_refresh_token(&hash_token(token))? > 0)
    }

    pub fn revoke_all_for_user(&self, user_id: Uuid) -> Result<RevokedCounts, AppError> {
        let counts = self.store.delete_all_for_user(user_id)?;
        tracing::info!(
            %user_id,
            refresh_tokens = counts.refresh_tokens,
            sessions = counts.sessions,
            "Revoked all sessions for user"
        );
        Ok(counts)
    }

    /// Expired tokens are removed before the age purge, so a token that is
    /// both expired and old is counted once, as expired.
    pub fn cleanup_expired(&self) -> Result<CleanupReport, AppError> {
        let now = self.clock.now();

        let deleted_expired_refresh_tokens = self.store.delete_expired_refresh_tokens(now)?;
        let deleted_old_refresh_tokens = self
            .store
            .delete_refresh_tokens_created_before(now - self.stale_after)?;
        let deleted_sessions = self.store.delete_expired_sessions(now)?;

        Ok(CleanupReport {
            deleted_expired_refresh_tokens,
            deleted_old_refresh_tokens,
            deleted_sessions,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;

    use super::*;
    use crate::auth::test_support::{session, token_store};
    use crate::clock::ManualClock;
    use crate::db::memory::InMemoryStore;

    fn setup() -> (RefreshTokenStore, Arc<InMemoryStore>, Arc<ManualClock>) {
        token_store(Duration::days(30), Duration::days(90))
    }

    #[test]
    fn created_token_is_only_stored_as_digest() {
        let (tokens, memory, _) = setup();
        let user_id = Uuid::new_v4();

        let issued = tokens
            .create(&session(user_id, Utc::now() + Duration::days(30)))
            .unwrap();

        let stored = memory.refresh_tokens_for_user(user_id);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].token_hash, hash_token(&issued.token));
        assert_ne!(stored[0].token_hash, issued.token);
    }

    #[test]
    fn created_token_takes_user_and_device_from_its_session() {
        let (tokens, memory, clock) = setup();
        let user_id = Uuid::new_v4();
        let opened = Session {
            device_id: Some("tablet".to_string()),
            ..session(user_id, clock.now() + Duration::days(30))
        };

        let issued = tokens.create(&opened).unwrap();

        assert_eq!(issued.user_id, user_id);
        assert_eq!(issued.session_id, opened.id);
        assert_eq!(issued.expires_at, clock.now() + Duration::days(30));
        let stored = memory.refresh_tokens_for_user(user_id);
        assert_eq!(stored[0].device_id.as_deref(), Some("tablet"));
        assert_eq!(memory.sessions_for_user(user_id), vec![opened]);
    }

    #[test]
    fn reused_session_id_stores_nothing() {
        let (tokens, memory, clock) = setup();
        let user_id = Uuid::new_v4();
        let opened = session(user_id, clock.now() + Duration::days(30));
        tokens.create(&opened).unwrap();

        assert!(matches!(tokens.create(&opened), Err(AppError::DatabaseError(_))));
        assert_eq!(memory.refresh_tokens_for_user(user_id).len(), 1);
    }

    #[test]
    fn rotate_replaces_token_and_keeps_owner() {
        let (tokens, memory, _) = setup();
        let user_id = Uuid::new_v4();
        let opened = Session {
            device_id: Some("laptop".to_string()),
            ..session(user_id, Utc::now() + Duration::days(30))
        };
        let first = tokens.create(&opened).unwrap();

        let second = tokens.rotate(&first.token, None).unwrap();

        assert_ne!(first.token, second.token);
        assert_eq!(second.user_id, user_id);
        assert_eq!(second.session_id, opened.id);

        let stored = memory.refresh_tokens_for_user(user_id);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].device_id.as_deref(), Some("laptop"));
    }

    #[test]
    fn rotate_with_new_device_updates_token_and_session() {
        let (tokens, memory, _) = setup();
        let user_id = Uuid::new_v4();
        let opened = Session {
            device_id: Some("phone".to_string()),
            ..session(user_id, Utc::now() + Duration::days(30))
        };
        let first = tokens.create(&opened).unwrap();

        let second = tokens.rotate(&first.token, Some("laptop".to_string())).unwrap();

        let stored_token = memory.refresh_tokens_for_user(user_id);
        let stored_session = memory.sessions_for_user(user_id);
        assert_eq!(stored_token[0].device_id.as_deref(), Some("laptop"));
        assert_eq!(stored_session[0].device_id.as_deref(), Some("laptop"));
        assert_eq!(stored_session[0].expires_at, second.expires_at);
    }

    #[test]
    fn rotated_token_cannot_be_replayed() {
        let (tokens, _, _) = setup();
        let first = tokens
            .create(&session(Uuid::new_v4(), Utc::now() + Duration::days(30)))
            .unwrap();

        tokens.rotate(&first.token, None).unwrap();

        assert!(matches!(
            tokens.rotate(&first.token, None),
            Err(AppError::InvalidRefreshToken)
        ));
    }

    #[test]
    fn expired_token_cannot_rotate() {
        let (tokens, _, clock) = setup();
        let issued = tokens
            .create(&session(Uuid::new_v4(), clock.now() + Duration::days(60)))
            .unwrap();

        clock.advance(Duration::days(30));

        assert!(matches!(
            tokens.rotate(&issued.token, None),
            Err(AppError::InvalidRefreshToken)
        ));
    }

    #[test]
    fn unknown_token_cannot_rotate() {
        let (tokens, _, _) = setup();
        assert!(matches!(
            tokens.rotate("never-issued", None),
            Err(AppError::InvalidRefreshToken)
        ));
    }

    #[test]
    fn concurrent_rotation_of_one_token_succeeds_exactly_once() {
        let (tokens, memory, _) = setup();
        let user_id = Uuid::new_v4();
        let issued = tokens
            .create(&session(user_id, Utc::now() + Duration::days(30)))
            .unwrap();

        let contenders = 8;
        let barrier = Barrier::new(contenders);
        let results: Vec<Result<IssuedRefreshToken, AppError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..contenders)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        tokens.rotate(&issued.token, None)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, AppError::InvalidRefreshToken))
        );
        assert_eq!(memory.refresh_tokens_for_user(user_id).len(), 1);
    }

    #[test]
    fn revoke_is_idempotent() {
        let (tokens, _, _) = setup();
        let issued = tokens
            .create(&session(Uuid::new_v4(), Utc::now() + Duration::days(30)))
            .unwrap();

        assert!(tokens.revoke(&issued.token).unwrap());
        assert!(!tokens.revoke(&issued.token).unwrap());
        assert!(matches!(
            tokens.rotate(&issued.token, None),
            Err(AppError::InvalidRefreshToken)
        ));
    }

    #[test]
    fn revoke_all_blocks_every_token_and_removes_sessions() {
        let (tokens, memory, _) = setup();
        let user_id = Uuid::new_v4();
        let other_user = Uuid::new_v4();
        let expiry = Utc::now() + Duration::days(30);

        let phone = tokens.create(&session(user_id, expiry)).unwrap();
        let laptop = tokens.create(&session(user_id, expiry)).unwrap();
        let unrelated = tokens.create(&session(other_user, expiry)).unwrap();

        let counts = tokens.revoke_all_for_user(user_id).unwrap();
        assert_eq!(counts, RevokedCounts { refresh_tokens: 2, sessions: 2 });

        for token in [&phone.token, &laptop.token] {
            assert!(matches!(
                tokens.rotate(token, None),
                Err(AppError::InvalidRefreshToken)
            ));
        }
        assert!(memory.sessions_for_user(user_id).is_empty());
        assert!(tokens.rotate(&unrelated.token, None).is_ok());
    }

    #[test]
    fn cleanup_removes_expired_and_stale_but_keeps_fresh_tokens() {
        let (tokens, memory, clock) = setup();
        let start = clock.now();
        let user_id = Uuid::new_v4();
        let far = start + Duration::days(365);

        // Created day 0, expires day 200: unexpired but older than 90 days by day 95
        let long_lived = RefreshTokenStore { ttl: Duration::days(200), ..tokens.clone() };
        let stale = long_lived.create(&session(user_id, far)).unwrap();

        // Created day 0, expires day 30
        let expired = tokens.create(&session(user_id, far)).unwrap();

        clock.advance(Duration::days(95));
        let fresh = tokens.create(&session(user_id, far)).unwrap();

        // A session that ended on day 50; its live token goes with it
        let ended = session(user_id, start + Duration::days(50));
        tokens.create(&ended).unwrap();

        let report = tokens.cleanup_expired().unwrap();
        assert_eq!(
            report,
            CleanupReport {
                deleted_expired_refresh_tokens: 1,
                deleted_old_refresh_tokens: 1,
                deleted_sessions: 1,
            }
        );

        let remaining = memory.refresh_tokens_for_user(user_id);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].token_hash, hash_token(&fresh.token));
        assert!(tokens.rotate(&stale.token, None).is_err());
        assert!(tokens.rotate(&expired.token, None).is_err());
        assert!(
            memory
                .sessions_for_user(user_id)
                .iter()
                .all(|s| s.id != ended.id)
        );
    }

    #[test]
    fn cleanup_is_idempotent() {
        let (tokens, _, clock) = setup();
        tokens
            .create(&session(Uuid::new_v4(), clock.now() + Duration::days(30)))
            .unwrap();

        clock.advance(Duration::days(31));
        assert_ne!(tokens.cleanup_expired().unwrap(), CleanupReport::default());
        assert_eq!(tokens.cleanup_expired().unwrap(), CleanupReport::default());
    }
}
