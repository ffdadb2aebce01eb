//! Turns a raw access token into an [`AuthenticatedIdentity`] and enforces
//! role requirements.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use doccontrol_auth_api::Role;
use uuid::Uuid;

use crate::auth::extractors::access_token;
use crate::auth::jwt::{Claims, JwtManager};
use crate::error::AppError;

/// Caller identity for the duration of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub user_id: Uuid,
    pub role: Role,
    pub session_id: Uuid,
    pub token_id: Uuid,
}

impl From<Claims> for AuthenticatedIdentity {
    fn from(c: Claims) -> Self {
        Self {
            user_id: c.sub,
            role: c.role,
            session_id: c.sid,
            token_id: c.jti,
        }
    }
}

/// Set of roles a route accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedRoles {
    roles: Vec<Role>,
}

impl AllowedRoles {
    pub fn only(roles: &[Role]) -> Self {
        Self {
            roles: roles.to_vec(),
        }
    }

    /// `minimum` and every role above it.
    pub fn at_least(minimum: Role) -> Self {
        Self {
            roles: Role::ALL
                .into_iter()
                .filter(|r| r.at_least(minimum))
                .collect(),
        }
    }

    /// Any authenticated caller.
    pub fn any() -> Self {
        Self::at_least(Role::User)
    }

    pub fn contains(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

#[derive(Clone)]
pub struct AuthGate {
    jwt: JwtManager,
}

impl AuthGate {
    pub fn new(jwt: JwtManager) -> Self {
        Self { jwt }
    }

    /// Every failure is the same `Unauthorized`; the cause is only logged.
    pub fn authenticate(&self, token: Option<&str>) -> Result<AuthenticatedIdentity, AppError> {
        let token = token.ok_or(AppError::Unauthorized)?;

        self.jwt.verify(token).map(AuthenticatedIdentity::from).map_err(|e| {
            tracing::debug!(error = %e, "Access token rejected");
            AppError::from(e)
        })
    }

    pub fn authorize(
        &self,
        token: Option<&str>,
        allowed: &AllowedRoles,
    ) -> Result<AuthenticatedIdentity, AppError> {
        let identity = self.authenticate(token)?;

        if !allowed.contains(identity.role) {
            tracing::warn!(
                user_id = %identity.user_id,
                role = %identity.role,
                "Role not allowed for route"
            );
            return Err(AppError::Forbidden);
        }

        Ok(identity)
    }
}

/// Middleware state: which gate to consult and which roles pass.
#[derive(Clone)]
pub struct RoleGuard {
    gate: AuthGate,
    allowed: AllowedRoles,
}

impl RoleGuard {
    pub fn new(gate: AuthGate, allowed: AllowedRoles) -> Self {
        Self { gate, allowed }
    }
}

/// Rejects the request before it reaches the handler unless the caller holds
/// an allowed role. On success the identity is stored in request extensions.
pub async fn require_roles(
    State(guard): State<RoleGuard>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = guard
        .gate
        .authorize(access_token(request.headers()), &guard.allowed)?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
