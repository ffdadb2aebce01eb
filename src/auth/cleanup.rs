//! Out-of-band purge of expired and stale refresh state, triggered by a
//! scheduler that proves itself with a shared secret.

use crate::auth::refresh_tokens::{CleanupReport, RefreshTokenStore};
use crate::auth::tokens::secrets_match;
use crate::error::AppError;

#[derive(Clone)]
pub struct CleanupJob {
    refresh_tokens: RefreshTokenStore,
    secret: Option<String>,
}

impl CleanupJob {
    /// An empty secret counts as unset.
    pub fn new(refresh_tokens: RefreshTokenStore, secret: Option<String>) -> Self {
        Self {
            refresh_tokens,
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    pub fn authorize_trigger(&self, provided: Option<&str>) -> Result<(), AppError> {
        let Some(expected) = self.secret.as_deref() else {
            return Err(AppError::configuration("CRON_SECRET is not configured"));
        };

        match provided {
            Some(provided) if secrets_match(provided, expected) => Ok(()),
            _ => {
                tracing::warn!("Cleanup trigger rejected: bad or missing secret");
                Err(AppError::Unauthorized)
            }
        }
    }

    pub fn run(&self) -> Result<CleanupReport, AppError> {
        let report = self.refresh_tokens.cleanup_expired()?;
        tracing::info!(
            deleted_expired_refresh_tokens = report.deleted_expired_refresh_tokens,
            deleted_old_refresh_tokens = report.deleted_old_refresh_tokens,
            deleted_sessions = report.deleted_sessions,
            "Cleanup finished"
        );
        Ok(report)
    }
}
