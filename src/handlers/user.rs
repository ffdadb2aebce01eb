use std::sync::Arc;

use axum::extract::{Path, State};
use doccontrol_auth_api::{CurrentUserResponse, RevokedSessionsResponse};
use uuid::Uuid;

use crate::auth::gate::AuthenticatedIdentity;
use crate::auth::services::AuthService;
use crate::error::AppError;
use crate::handlers::run_blocking;
use crate::response::AppResponse;

/// GET /users/me
pub async fn get_current_user(
    identity: AuthenticatedIdentity,
    State(service): State<Arc<AuthService>>,
) -> Result<AppResponse<CurrentUserResponse>, AppError> {
    let user = run_blocking(move || service.get_current_user(&identity)).await?;
    Ok(AppResponse::ok(user))
}

/// DELETE /admin/users/{id}/sessions
/// Logs the target user out of every device.
pub async fn revoke_user_sessions(
    Path(user_id): Path<Uuid>,
    admin: AuthenticatedIdentity,
    State(service): State<Arc<AuthService>>,
) -> Result<AppResponse<RevokedSessionsResponse>, AppError> {
    tracing::info!(admin_id = %admin.user_id, target_user_id = %user_id, "Admin revoking sessions");

    let revoked = run_blocking(move || service.revoke_user_sessions(user_id)).await?;
    Ok(AppResponse::ok(revoked))
}
