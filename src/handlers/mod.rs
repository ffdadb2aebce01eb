pub mod auth;
pub mod cron;
pub mod health;
pub mod user;

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{header, request::Parts};

use crate::db::models::session::SessionMetadata;
use crate::error::AppError;
use crate::middleware::rate_limit::client_key;

/// Runs a storage or hashing call off the async executor.
pub async fn run_blocking<T, F>(f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::internal(format!("Blocking task failed: {e}")))?
}

// Column widths of `sessions`
const MAX_IP_ADDRESS_LEN: usize = 64;
const MAX_USER_AGENT_LEN: usize = 512;

fn truncated(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

/// Who is calling, as far as the transport can tell.
#[derive(Debug, Clone)]
pub struct ClientContext {
    pub ip_address: String,
    pub user_agent: Option<String>,
}

impl ClientContext {
    pub fn session_metadata(self, device_id: Option<String>) -> SessionMetadata {
        SessionMetadata {
            device_id,
            user_agent: self.user_agent,
            ip_address: Some(self.ip_address),
        }
    }
}

impl<S> FromRequestParts<S> for ClientContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(Self {
            ip_address: truncated(&client_key(&parts.headers, peer), MAX_IP_ADDRESS_LEN),
            user_agent: parts
                .headers
                .get(header::USER_AGENT)
                .and_then(|h| h.to_str().ok())
                .map(|ua| truncated(ua, MAX_USER_AGENT_LEN)),
        })
    }
}
