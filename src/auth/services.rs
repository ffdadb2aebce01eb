// src/auth/services.rs

use std::sync::Arc;

use doccontrol_auth_api::{
    CurrentUserResponse, LoginRequest, LoginResponse, LogoutRequest, RefreshTokenResponse,
    RevokedSessionsResponse, TOKEN_TYPE_BEARER,
};
use uuid::Uuid;

use crate::auth::gate::AuthenticatedIdentity;
use crate::auth::jwt::JwtManager;
use crate::auth::password::PasswordManager;
use crate::auth::refresh_tokens::RefreshTokenStore;
use crate::auth::sessions::SessionCoordinator;
use crate::clock::Clock;
use crate::db::models::session::{RevokedCounts, SessionMetadata};
use crate::db::models::user::User;
use crate::db::store::UserStore;
use crate::error::AppError;

/// Login, refresh and logout flows on top of the token components.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    passwords: PasswordManager,
    jwt: JwtManager,
    refresh_tokens: RefreshTokenStore,
    sessions: SessionCoordinator,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        passwords: PasswordManager,
        jwt: JwtManager,
        refresh_tokens: RefreshTokenStore,
        sessions: SessionCoordinator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            passwords,
            jwt,
            refresh_tokens,
            sessions,
            clock,
        }
    }

    /// Refresh cookie lifetime, in seconds
    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_tokens.ttl().num_seconds()
    }

    /// Unknown email, inactive account and wrong password are
    /// indistinguishable to the caller, in the response and in timing.
    pub fn login(
        &self,
        request: &LoginRequest,
        metadata: SessionMetadata,
    ) -> Result<LoginResponse, AppError> {
        let email = request.email.trim().to_lowercase();

        let user = match self.users.find_by_email(&email)? {
            Some(user) => user,
            None => {
                self.passwords.verify_dummy(&request.password);
                tracing::info!("Login failed: unknown email");
                return Err(AppError::InvalidCredentials);
            }
        };

        let password_ok = match user.password_hash.as_deref() {
            Some(hash) => self.passwords.verify(&request.password, hash)?,
            None => self.passwords.verify_dummy(&request.password),
        };
        if !password_ok || !user.is_active {
            tracing::info!(user_id = %user.id, active = user.is_active, "Login failed");
            return Err(AppError::InvalidCredentials);
        }

        let role = role_of(&user)?;
        let refresh = self.sessions.open(user.id, metadata)?;
        let access = self.jwt.issue(user.id, role, refresh.session_id)?;
        self.users.touch_last_login(user.id, self.clock.now())?;

        tracing::info!(user_id = %user.id, session_id = %refresh.session_id, %role, "User logged in");
        tracing::debug!(
            token_id = %access.token_id,
            access_expires_at = %access.expires_at,
            refresh_expires_at = %refresh.expires_at,
            "Issued token pair"
        );

        Ok(LoginResponse {
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: self.jwt.expires_in(),
            user: user
                .to_response()
                .map_err(|e| AppError::internal(e.to_string()))?,
        })
    }

    /// Rotates the refresh token and mints a matching access token.
    /// The user is re-read so the new access token carries the current role.
    pub fn refresh(
        &self,
        refresh_token: &str,
        device_id: Option<String>,
    ) -> Result<RefreshTokenResponse, AppError> {
        let rotated = self.refresh_tokens.rotate(refresh_token, device_id)?;

        let user = match self.users.find_by_id(rotated.user_id)? {
            Some(user) if user.is_active => user,
            _ => {
                tracing::warn!(user_id = %rotated.user_id, "Refresh for missing or inactive user");
                self.refresh_tokens.revoke(&rotated.token)?;
                return Err(AppError::InvalidRefreshToken);
            }
        };

        let access = self
            .jwt
            .issue(user.id, role_of(&user)?, rotated.session_id)?;

        Ok(RefreshTokenResponse {
            access_token: access.token,
            refresh_token: rotated.token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: self.jwt.expires_in(),
        })
    }

    /// Current session, or every session with `logoutAll`
    pub fn logout(
        &self,
        identity: &AuthenticatedIdentity,
        request: &LogoutRequest,
    ) -> Result<RevokedCounts, AppError> {
        if request.logout_all {
            self.sessions.logout_all(identity.user_id)
        } else {
            self.sessions
                .logout_current(identity, request.refresh_token.as_deref())
        }
    }

    pub fn get_current_user(
        &self,
        identity: &AuthenticatedIdentity,
    ) -> Result<CurrentUserResponse, AppError> {
        let user = self
            .users
            .find_by_id(identity.user_id)?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        Ok(CurrentUserResponse {
            user: user
                .to_response()
                .map_err(|e| AppError::internal(e.to_string()))?,
            session_id: identity.session_id,
        })
    }

    /// Logout-all on behalf of an administrator.
    pub fn revoke_user_sessions(&self, user_id: Uuid) -> Result<RevokedSessionsResponse, AppError> {
        if self.users.find_by_id(user_id)?.is_none() {
            return Err(AppError::not_found("User not found"));
        }

        let counts = self.sessions.logout_all(user_id)?;
        Ok(RevokedSessionsResponse {
            revoked_refresh_tokens: counts.refresh_tokens,
            revoked_sessions: counts.sessions,
        })
    }
}

fn role_of(user: &User) -> Result<doccontrol_auth_api::Role, AppError> {
    user.role()
        .map_err(|e| AppError::internal(format!("user {}: {e}", user.id)))
}
