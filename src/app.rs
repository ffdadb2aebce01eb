// src/app.rs

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::FromRef,
    http::{HeaderValue, Method, header},
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use doccontrol_auth_api::Role;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::cleanup::CleanupJob;
use crate::auth::gate::{AllowedRoles, AuthGate, RoleGuard, require_roles};
use crate::auth::jwt::JwtManager;
use crate::auth::password::PasswordManager;
use crate::auth::refresh_tokens::RefreshTokenStore;
use crate::auth::services::AuthService;
use crate::auth::sessions::SessionCoordinator;
use crate::clock::Clock;
use crate::config::Config;
use crate::db::store::{TokenStore, UserStore};
use crate::handlers::auth::{RefreshCookie, login, logout, refresh};
use crate::handlers::cron::cleanup;
use crate::handlers::health::health;
use crate::handlers::user::{get_current_user, revoke_user_sessions};
use crate::middleware::rate_limit::{RateLimitStore, RateLimiter, rate_limit};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub gate: AuthGate,
    pub cleanup: CleanupJob,
    pub refresh_cookie: RefreshCookie,
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth_service.clone()
    }
}

impl FromRef<AppState> for AuthGate {
    fn from_ref(state: &AppState) -> Self {
        state.gate.clone()
    }
}

impl FromRef<AppState> for CleanupJob {
    fn from_ref(state: &AppState) -> Self {
        state.cleanup.clone()
    }
}

impl FromRef<AppState> for RefreshCookie {
    fn from_ref(state: &AppState) -> Self {
        state.refresh_cookie
    }
}

/// Everything the router needs, wired from configuration.
pub struct App {
    state: AppState,
    general_limit: RateLimiter,
    strict_limit: RateLimiter,
    cors_origin: HeaderValue,
}

impl App {
    pub fn new(
        config: &Config,
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
        rate_limits: RateLimitStore,
    ) -> anyhow::Result<Self> {
        let jwt = JwtManager::new(&config.jwt_secret, config.access_token_ttl(), clock.clone());
        let passwords =
            PasswordManager::new(config.bcrypt_cost).context("Failed to prepare password hasher")?;
        let refresh_tokens = RefreshTokenStore::new(
            tokens.clone(),
            clock.clone(),
            config.refresh_token_ttl(),
            config.stale_refresh_token_age(),
        );
        let sessions = SessionCoordinator::new(tokens, refresh_tokens.clone(), clock.clone());
        let cleanup = CleanupJob::new(refresh_tokens.clone(), config.cron_secret.clone());

        let auth_service = Arc::new(AuthService::new(
            users,
            passwords,
            jwt.clone(),
            refresh_tokens,
            sessions,
            clock.clone(),
        ));

        let cors_origin = HeaderValue::from_str(&config.frontend_url)
            .with_context(|| format!("FRONTEND_URL is not a valid origin: {}", config.frontend_url))?;

        Ok(Self {
            state: AppState {
                auth_service,
                gate: AuthGate::new(jwt),
                cleanup,
                refresh_cookie: RefreshCookie {
                    secure: config.is_production(),
                },
            },
            general_limit: RateLimiter::new(
                config.general_rate_limit(),
                rate_limits.clone(),
                clock.clone(),
            ),
            strict_limit: RateLimiter::new(config.strict_rate_limit(), rate_limits, clock),
            cors_origin,
        })
    }

    /// Request order on protected routes: rate limiter, auth gate, role
    /// check, handler.
    pub fn router(self) -> Router {
        let gate = self.state.gate.clone();
        let guard = |allowed: AllowedRoles| {
            from_fn_with_state(RoleGuard::new(gate.clone(), allowed), require_roles)
        };

        let auth_routes = Router::new()
            .route(
                "/login",
                post(login).layer(from_fn_with_state(self.strict_limit, rate_limit)),
            )
            .route("/refresh", post(refresh))
            .route("/logout", post(logout));

        let user_routes = Router::new()
            .route("/me", get(get_current_user))
            .route_layer(guard(AllowedRoles::any()));

        let admin_routes = Router::new()
            .route("/users/{id}/sessions", delete(revoke_user_sessions))
            .route_layer(guard(AllowedRoles::only(&[Role::Admin])));

        let limited = Router::new()
            .nest("/auth", auth_routes)
            .nest("/users", user_routes)
            .nest("/admin", admin_routes)
            .layer(from_fn_with_state(self.general_limit, rate_limit));

        let cors = CorsLayer::new()
            .allow_origin(self.cors_origin)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true);

        Router::new()
            .route("/health", get(health))
            .route("/cron/cleanup", post(cleanup).get(cleanup))
            .merge(limited)
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state)
    }
}
