// src/handlers/auth.rs

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue};
use doccontrol_auth_api::{
    LoginRequest, LoginResponse, LogoutRequest, MessageResponse, RefreshTokenRequest,
    RefreshTokenResponse,
};

use crate::auth::extractors::{REFRESH_TOKEN_COOKIE, cookie_value};
use crate::auth::gate::AuthenticatedIdentity;
use crate::auth::services::AuthService;
use crate::error::AppError;
use crate::handlers::{ClientContext, run_blocking};
use crate::response::AppResponse;
use crate::validation::{JsonOrDefault, ValidatedJson};

/// How the `refresh_token` cookie is written.
#[derive(Debug, Clone, Copy)]
pub struct RefreshCookie {
    pub secure: bool,
}

impl RefreshCookie {
    fn attributes(self) -> &'static str {
        if self.secure {
            "HttpOnly; Secure; SameSite=Strict; Path=/auth"
        } else {
            "HttpOnly; SameSite=Strict; Path=/auth"
        }
    }

    pub fn set(self, token: &str, max_age_secs: i64) -> Result<HeaderValue, AppError> {
        HeaderValue::from_str(&format!(
            "{REFRESH_TOKEN_COOKIE}={token}; {}; Max-Age={max_age_secs}",
            self.attributes()
        ))
        .map_err(|_| AppError::internal("Failed to set cookie"))
    }

    pub fn clear(self) -> Result<HeaderValue, AppError> {
        HeaderValue::from_str(&format!(
            "{REFRESH_TOKEN_COOKIE}=; {}; Max-Age=0",
            self.attributes()
        ))
        .map_err(|_| AppError::internal("Failed to clear cookie"))
    }
}

/// POST /auth/login
pub async fn login(
    State(auth_service): State<Arc<AuthService>>,
    State(cookie): State<RefreshCookie>,
    client: ClientContext,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<AppResponse<LoginResponse>, AppError> {
    let max_age = auth_service.refresh_ttl_secs();
    let metadata = client.session_metadata(payload.device_id.clone());

    let response = run_blocking(move || auth_service.login(&payload, metadata)).await?;

    let set_cookie = cookie.set(&response.refresh_token, max_age)?;
    Ok(AppResponse::ok(response).with_cookie(set_cookie))
}

/// POST /auth/refresh
///
/// Token from the body, else from the `refresh_token` cookie.
pub async fn refresh(
    State(auth_service): State<Arc<AuthService>>,
    State(cookie): State<RefreshCookie>,
    headers: HeaderMap,
    JsonOrDefault(payload): JsonOrDefault<RefreshTokenRequest>,
) -> Result<AppResponse<RefreshTokenResponse>, AppError> {
    let RefreshTokenRequest {
        refresh_token,
        device_id,
    } = payload;
    let refresh_token = refresh_token
        .or_else(|| cookie_value(&headers, REFRESH_TOKEN_COOKIE).map(str::to_string))
        .ok_or(AppError::InvalidRefreshToken)?;

    let max_age = auth_service.refresh_ttl_secs();
    let response =
        run_blocking(move || auth_service.refresh(&refresh_token, device_id)).await?;

    let set_cookie = cookie.set(&response.refresh_token, max_age)?;
    Ok(AppResponse::ok(response).with_cookie(set_cookie))
}

/// POST /auth/logout
pub async fn logout(
    identity: AuthenticatedIdentity,
    State(auth_service): State<Arc<AuthService>>,
    State(cookie): State<RefreshCookie>,
    headers: HeaderMap,
    JsonOrDefault(mut payload): JsonOrDefault<LogoutRequest>,
) -> Result<AppResponse<MessageResponse>, AppError> {
    if payload.refresh_token.is_none() {
        payload.refresh_token = cookie_value(&headers, REFRESH_TOKEN_COOKIE).map(str::to_string);
    }

    let logout_all = payload.logout_all;
    run_blocking(move || auth_service.logout(&identity, &payload)).await?;

    let message = if logout_all {
        "Logged out from all devices"
    } else {
        "Logged out successfully"
    };
    Ok(AppResponse::ok(MessageResponse::new(message)).with_cookie(cookie.clear()?))
}
