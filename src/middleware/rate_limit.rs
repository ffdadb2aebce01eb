//! Rate limiting middleware.
//!
//! Fixed-window counters per client address, kept in process memory. Counters
//! are lost on restart and are not shared between instances of the service.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::clock::Clock;
use crate::error::AppError;

/// Configuration for one mounted limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Requests allowed per window.
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 15 * 60 * 1000,
            max_requests: 100,
        }
    }
}

impl RateLimitConfig {
    fn window(self) -> Duration {
        Duration::milliseconds(i64::try_from(self.window_ms).unwrap_or(i64::MAX))
    }
}

#[derive(Debug, Clone, Copy)]
struct RateLimitRecord {
    count: u32,
    window_reset: DateTime<Utc>,
}

/// Counter map shared by every limiter of the process.
///
/// Each limiter namespaces its keys with its own window and limit, so two
/// limiters never read each other's counters.
#[derive(Clone, Default)]
pub struct RateLimitStore {
    records: Arc<Mutex<HashMap<String, RateLimitRecord>>>,
}

impl RateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops records whose window has ended. Returns how many were removed.
    pub fn purge_stale(&self, now: DateTime<Utc>) -> usize {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, r| r.window_reset > now);
        before - records.len()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.records.lock().len()
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    store: RateLimitStore,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, store: RateLimitStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            store,
            clock,
        }
    }

    fn key(&self, client: &str) -> String {
        format!(
            "{client}|{}|{}",
            self.config.window_ms, self.config.max_requests
        )
    }

    /// One atomic increment-and-compare for `client`.
    ///
    /// A rejected request leaves the counter untouched.
    pub fn check(&self, client: &str) -> Result<(), AppError> {
        let now = self.clock.now();
        let key = self.key(client);
        let mut records = self.store.records.lock();

        if let Some(record) = records
            .get_mut(&key)
            .filter(|r| now < r.window_reset)
        {
            if record.count >= self.config.max_requests {
                let remaining_ms =
                    u64::try_from((record.window_reset - now).num_milliseconds()).unwrap_or(0);
                let retry_after_secs = remaining_ms.div_ceil(1000).max(1);

                tracing::warn!(
                    client,
                    max_requests = self.config.max_requests,
                    retry_after_secs,
                    "Rate limit exceeded"
                );
                return Err(AppError::RateLimitExceeded { retry_after_secs });
            }
            record.count += 1;
            return Ok(());
        }

        // New client, or the previous window is over
        records.insert(
            key,
            RateLimitRecord {
                count: 1,
                window_reset: now + self.config.window(),
            },
        );
        Ok(())
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, then the
/// socket peer.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(first) = header_value(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }
    if let Some(real_ip) = header_value(headers, "x-real-ip") {
        return real_ip.to_string();
    }

    peer.map_or_else(|| "unknown".to_string(), |addr| addr.ip().to_string())
}

/// Rate limiting middleware function.
///
/// `ConnectInfo` is read from extensions because it is absent under Lambda.
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    limiter.check(&client_key(request.headers(), peer))?;
    Ok(next.run(request).await)
}
