//! Application Startup
//!
//! Application building, shared state, and the housekeeping task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use sqlx::PgPool;
use tokio::net::TcpListener;

use crate::application::TokenVerifier;
use crate::config::Settings;
use crate::infrastructure::crypto::RoomCipher;
use crate::infrastructure::database;
use crate::infrastructure::stores::{
    CircuitBreaker, MessageDeduplicator, RateLimiter, SecurityEventLog, SessionStore,
};
use crate::presentation::http::routes;
use crate::presentation::middleware::create_cors_layer;
use crate::presentation::websocket::ChatGateway;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub settings: Arc<Settings>,
    pub verifier: TokenVerifier,
    pub cipher: RoomCipher,
    pub sessions: Arc<SessionStore>,
    pub rate_limiter: Arc<RateLimiter>,
    pub security_log: Arc<SecurityEventLog>,
    pub dedup: Arc<MessageDeduplicator>,
    pub follow_breaker: Arc<CircuitBreaker>,
    pub gateway: Arc<ChatGateway>,
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        // Create database pool
        let db = database::create_pool(&settings.database).await?;
        tracing::info!("Database connection pool created");

        database::run_migrations(&db).await?;
        tracing::info!("Database migrations applied");

        // Process-wide in-memory stores; empty after every restart by design
        let security_log = Arc::new(SecurityEventLog::new());
        let state = AppState {
            db,
            verifier: TokenVerifier::new(settings.auth.secret.clone()),
            cipher: RoomCipher::new(settings.encryption.master_key.clone()),
            sessions: Arc::new(SessionStore::new(settings.auth.session_ttl_hours)),
            rate_limiter: Arc::new(RateLimiter::new(
                settings.rate_limit.clone(),
                security_log.clone(),
            )),
            security_log,
            dedup: Arc::new(MessageDeduplicator::new()),
            follow_breaker: Arc::new(CircuitBreaker::new("follow_check")),
            gateway: Arc::new(ChatGateway::new()),
            settings: Arc::new(settings.clone()),
        };

        spawn_housekeeping(state.clone());

        // Build router with middleware
        let router = routes::create_router(state)
            .layer(tower_http::trace::TraceLayer::new_for_http())
            .layer(create_cors_layer(&settings.cors));

        // Bind to address
        let addr = SocketAddr::from(([0, 0, 0, 0], settings.server.port));
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self { listener, router })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// Periodic cleanup of expired sessions, rate-limit buckets, and security
/// logs. Runs as its own task so housekeeping never blocks command
/// processing.
fn spawn_housekeeping(state: AppState) {
    let interval = Duration::from_secs(state.settings.sweep.interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // skip the immediate first tick
        loop {
            ticker.tick().await;
            let sessions = state.sessions.sweep();
            let buckets = state.rate_limiter.sweep();
            let logs = state.security_log.sweep();
            tracing::debug!(
                expired_sessions = sessions,
                stale_buckets = buckets,
                stale_security_logs = logs,
                "Housekeeping pass complete"
            );
        }
    });
}
