use std::sync::Arc;

use uuid::Uuid;

use crate::auth::gate::AuthenticatedIdentity;
use crate::auth::refresh_tokens::{IssuedRefreshToken, RefreshTokenStore};
use crate::clock::Clock;
use crate::db::models::session::{RevokedCounts, Session, SessionMetadata};
use crate::db::store::TokenStore;
use crate::error::AppError;

/// Opens sessions at login and tears them down at logout.
#[derive(Clone)]
pub struct SessionCoordinator {
    store: Arc<dyn TokenStore>,
    refresh_tokens: RefreshTokenStore,
    clock: Arc<dyn Clock>,
}

impl SessionCoordinator {
    pub fn new(
        store: Arc<dyn TokenStore>,
        refresh_tokens: RefreshTokenStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            refresh_tokens,
            clock,
        }
    }

    /// New session plus its first refresh token, stored in one step. Both
    /// share the same expiry.
    pub fn open(
        &self,
        user_id: Uuid,
        metadata: SessionMetadata,
    ) -> Result<IssuedRefreshToken, AppError> {
        let now = self.clock.now();
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            device_id: metadata.device_id,
            user_agent: metadata.user_agent,
            ip_address: metadata.ip_address,
            expires_at: now + self.refresh_tokens.ttl(),
            created_at: now,
        };
        self.refresh_tokens.create(&session)
    }

    /// Ends the session the access token was issued for. A refresh token
    /// handed in alongside is revoked as well. The access token itself stays
    /// valid until it expires.
    pub fn logout_current(
        &self,
        identity: &AuthenticatedIdentity,
        refresh_token: Option<&str>,
    ) -> Result<RevokedCounts, AppError> {
        let mut counts = self.store.delete_session(identity.session_id)?;

        if let Some(raw) = refresh_token
            && self.refresh_tokens.revoke(raw)?
        {
            counts.refresh_tokens += 1;
        }

        tracing::info!(
            user_id = %identity.user_id,
            session_id = %identity.session_id,
            token_id = %identity.token_id,
            refresh_tokens = counts.refresh_tokens,
            "Session logged out"
        );
        Ok(counts)
    }

    /// Every session and refresh token of the user, in one store operation.
    pub fn logout_all(&self, user_id: Uuid) -> Result<RevokedCounts, AppError> {
        self.refresh_tokens.revoke_all_for_user(user_id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use doccontrol_auth_api::Role;

    use super::*;
    use crate::auth::test_support::token_store;
    use crate::clock::ManualClock;
    use crate::db::memory::InMemoryStore;

    fn setup() -> (SessionCoordinator, RefreshTokenStore, Arc<InMemoryStore>, Arc<ManualClock>) {
        let (tokens, memory, clock) = token_store(Duration::days(30), Duration::days(90));
        let sessions = SessionCoordinator::new(memory.clone(), tokens.clone(), clock.clone());
        (sessions, tokens, memory, clock)
    }

    fn identity(user_id: Uuid, session_id: Uuid) -> AuthenticatedIdentity {
        AuthenticatedIdentity {
            user_id,
            role: Role::User,
            session_id,
            token_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn open_records_metadata_and_matching_expiry() {
        let (sessions, _, memory, clock) = setup();
        let user_id = Uuid::new_v4();

        let issued = sessions
            .open(
                user_id,
                SessionMetadata {
                    device_id: Some("tablet".to_string()),
                    user_agent: Some("curl/8".to_string()),
                    ip_address: Some("203.0.113.9".to_string()),
                },
            )
            .unwrap();

        let stored = memory.sessions_for_user(user_id);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, issued.session_id);
        assert_eq!(stored[0].device_id.as_deref(), Some("tablet"));
        assert_eq!(stored[0].ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(stored[0].expires_at, clock.now() + Duration::days(30));
        assert_eq!(issued.expires_at, stored[0].expires_at);
    }

    #[test]
    fn logout_current_leaves_other_sessions_alone() {
        let (sessions, tokens, memory, _) = setup();
        let user_id = Uuid::new_v4();
        let here = sessions.open(user_id, SessionMetadata::default()).unwrap();
        let elsewhere = sessions.open(user_id, SessionMetadata::default()).unwrap();

        let counts = sessions
            .logout_current(&identity(user_id, here.session_id), None)
            .unwrap();

        assert_eq!(counts, RevokedCounts { refresh_tokens: 1, sessions: 1 });
        assert!(tokens.rotate(&here.token, None).is_err());
        assert!(tokens.rotate(&elsewhere.token, None).is_ok());
        assert_eq!(memory.sessions_for_user(user_id).len(), 1);
    }

    #[test]
    fn logout_current_also_revokes_supplied_refresh_token() {
        let (sessions, tokens, _, _) = setup();
        let user_id = Uuid::new_v4();
        let here = sessions.open(user_id, SessionMetadata::default()).unwrap();
        let other = sessions.open(user_id, SessionMetadata::default()).unwrap();

        let counts = sessions
            .logout_current(&identity(user_id, here.session_id), Some(&other.token))
            .unwrap();

        assert_eq!(counts.refresh_tokens, 2);
        assert!(tokens.rotate(&other.token, None).is_err());
    }

    #[test]
    fn logout_current_twice_is_harmless() {
        let (sessions, _, _, _) = setup();
        let user_id = Uuid::new_v4();
        let here = sessions.open(user_id, SessionMetadata::default()).unwrap();
        let who = identity(user_id, here.session_id);

        sessions.logout_current(&who, None).unwrap();
        assert_eq!(
            sessions.logout_current(&who, Some(&here.token)).unwrap(),
            RevokedCounts::default()
        );
    }

    #[test]
    fn logout_all_wins_against_concurrent_refreshes() {
        let (sessions, tokens, memory, _) = setup();
        let user_id = Uuid::new_v4();
        let issued: Vec<_> = (0..4)
            .map(|_| sessions.open(user_id, SessionMetadata::default()).unwrap())
            .collect();

        let barrier = std::sync::Barrier::new(issued.len() + 1);
        let rotated: Vec<Option<String>> = std::thread::scope(|scope| {
            let refreshers: Vec<_> = issued
                .iter()
                .map(|t| {
                    let (tokens, barrier) = (&tokens, &barrier);
                    scope.spawn(move || {
                        barrier.wait();
                        tokens.rotate(&t.token, None).ok().map(|n| n.token)
                    })
                })
                .collect();
            barrier.wait();
            sessions.logout_all(user_id).unwrap();
            refreshers.into_iter().map(|h| h.join().unwrap()).collect()
        });

        // Whatever won the race before logout-all committed is dead now too
        for token in rotated.into_iter().flatten() {
            assert!(tokens.rotate(&token, None).is_err());
        }
        for original in &issued {
            assert!(tokens.rotate(&original.token, None).is_err());
        }
        assert!(memory.sessions_for_user(user_id).is_empty());
        assert!(memory.refresh_tokens_for_user(user_id).is_empty());
    }
}
