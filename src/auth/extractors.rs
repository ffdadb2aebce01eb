//! Transport adapters: where an access token can come from on a request.
//!
//! Both the `Authorization: Bearer` header and the `access_token` cookie feed
//! the same [`AuthGate::authenticate`] call.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::{HeaderMap, header, request::Parts};

use crate::auth::gate::{AuthGate, AuthenticatedIdentity};
use crate::error::AppError;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

const BEARER: &str = "Bearer ";

/// Token from `Authorization: Bearer <token>`, if well-formed and non-empty.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER)
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// First non-empty value of the named cookie across all `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(key, value)| (key, value.trim()))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value)
}

/// Header first, cookie second.
pub fn access_token(headers: &HeaderMap) -> Option<&str> {
    bearer_token(headers).or_else(|| cookie_value(headers, ACCESS_TOKEN_COOKIE))
}

/// Reuses the identity a [`require_roles`](crate::auth::gate::require_roles)
/// layer already resolved, otherwise verifies the request's token.
impl<S> FromRequestParts<S> for AuthenticatedIdentity
where
    S: Send + Sync,
    AuthGate: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<AuthenticatedIdentity>() {
            return Ok(*identity);
        }

        AuthGate::from_ref(state).authenticate(access_token(&parts.headers))
    }
}
