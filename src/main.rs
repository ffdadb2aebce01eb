mod app;
mod auth;
mod clock;
mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod response;
mod validation;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use app::App;
use auth::password::PasswordManager;
use clock::{Clock, SystemClock};
use config::{Config, StorageBackend};
use db::connection::create_pool;
use db::memory::InMemoryStore;
use db::models::user::User;
use db::repositories::{RefreshTokenRepository, UserRepository};
use db::store::{TokenStore, UserStore};
use doccontrol_auth_api::Role;
use middleware::rate_limit::RateLimitStore;

pub fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(
            "info,doccontrol_auth=debug,hyper_util=warn,tower_http=info",
        )
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Picks the storage backend named by the configuration.
fn build_stores(
    config: &Config,
    clock: &dyn Clock,
) -> anyhow::Result<(Arc<dyn UserStore>, Arc<dyn TokenStore>)> {
    match config.storage_backend {
        StorageBackend::Postgres => {
            let pool = create_pool(&config.database_url, config.database_pool_size)?;
            tracing::info!(pool_size = config.database_pool_size, "Postgres pool ready");
            Ok((
                Arc::new(UserRepository::new(pool.clone())),
                Arc::new(RefreshTokenRepository::new(pool)),
            ))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage: state is lost on restart");
            let memory = Arc::new(InMemoryStore::new());
            seed_admin(&memory, config, clock)?;
            Ok((memory.clone(), memory))
        }
    }
}

/// The in-memory backend starts empty; an admin account makes it usable.
fn seed_admin(memory: &InMemoryStore, config: &Config, clock: &dyn Clock) -> anyhow::Result<()> {
    let (Some(email), Some(password)) = (&config.seed_admin_email, &config.seed_admin_password)
    else {
        tracing::warn!("SEED_ADMIN_EMAIL/SEED_ADMIN_PASSWORD not set, no account can log in");
        return Ok(());
    };

    let email = email.trim().to_lowercase();
    let password_hash = PasswordManager::new(config.bcrypt_cost)?.hash(password)?;
    let now = clock.now();

    memory.insert_user(User {
        id: Uuid::new_v4(),
        username: email.split('@').next().unwrap_or(&email).to_string(),
        email: email.clone(),
        password_hash: Some(password_hash),
        role: Role::Admin.as_str().to_string(),
        is_active: true,
        created_at: now,
        updated_at: now,
        last_login_at: None,
    });
    tracing::info!(%email, "Seeded admin account");
    Ok(())
}

/// Drops finished rate-limit windows once per window.
fn spawn_rate_limit_purge(store: RateLimitStore, clock: Arc<dyn Clock>, window_ms: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_millis(window_ms));
        loop {
            ticker.tick().await;
            let purged = store.purge_stale(clock.now());
            if purged > 0 {
                tracing::debug!(purged, "Purged stale rate limit records");
            }
        }
    });
}

// ----------------- Main -----------------

#[tokio::main]
async fn main() -> Result<(), lambda_http::Error> {
    setup_logging();
    tracing::info!("Starting doccontrol-auth...");

    let config = Config::from_env()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let (users, tokens) = build_stores(&config, clock.as_ref())?;
    let rate_limits = RateLimitStore::new();
    spawn_rate_limit_purge(rate_limits.clone(), clock.clone(), config.rate_limit_window_ms);

    let app = App::new(&config, users, tokens, clock, rate_limits)?.router();

    if env::var("AWS_LAMBDA_FUNCTION_NAME").is_ok() {
        tracing::info!("Running in Lambda mode");
        lambda_http::run(app).await
    } else {
        tracing::info!("Running in local HTTP server mode");
        let addr = format!("{}:{}", config.server_host, config.server_port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        tracing::info!("Server running at http://{}", addr);
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;

        Ok(())
    }
}
