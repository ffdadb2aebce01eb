use axum::extract::State;
use axum::http::HeaderMap;
use doccontrol_auth_api::CleanupResponse;

use crate::auth::cleanup::CleanupJob;
use crate::auth::extractors::bearer_token;
use crate::error::AppError;
use crate::handlers::run_blocking;
use crate::response::AppResponse;

/// POST|GET /cron/cleanup
/// Scheduler entry point, authenticated with `Authorization: Bearer <CRON_SECRET>`.
pub async fn cleanup(
    State(job): State<CleanupJob>,
    headers: HeaderMap,
) -> Result<AppResponse<CleanupResponse>, AppError> {
    job.authorize_trigger(bearer_token(&headers))?;

    let report = run_blocking(move || job.run()).await?;
    Ok(AppResponse::ok(CleanupResponse {
        deleted_sessions_count: report.deleted_sessions,
        deleted_old_refresh_tokens_count: report.deleted_old_refresh_tokens,
        deleted_expired_refresh_tokens_count: report.deleted_expired_refresh_tokens,
    }))
}
