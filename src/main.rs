use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use secrecy::ExposeSecret;
use tokio::signal;
use tracing::{info, warn};

use eshop_backend::api::{create_router, create_router_with_rate_limit};
use eshop_backend::app::AppState;
use eshop_backend::config::AppConfig;
use eshop_backend::infra::observability::{init_metrics_handle, init_tracing};
use eshop_backend::infra::{Argon2Hasher, InMemoryLoginAttemptStore, JwtTokenIssuer, PostgresClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = AppConfig::from_env().context("invalid configuration")?;
    init_tracing(config.log_format);

    let metrics = init_metrics_handle();
    if metrics.is_none() {
        warn!("Prometheus recorder could not be installed, /metrics disabled");
    }

    let db = Arc::new(
        PostgresClient::with_defaults(config.database_url.expose_secret())
            .await
            .context("failed to connect to PostgreSQL")?,
    );
    db.run_migrations()
        .await
        .context("failed to run migrations")?;

    info!(
        max_failed_attempts = config.login_guard.max_failed_attempts,
        lockout_secs = config.login_guard.lockout_time.as_secs(),
        mode = ?config.login_guard.mode,
        "Login guard configured"
    );

    let state = AppState::new(
        db.clone(),
        db,
        Arc::new(Argon2Hasher::new()),
        Arc::new(JwtTokenIssuer::new(&config.jwt)),
        Arc::new(InMemoryLoginAttemptStore::with_idle_ttl(
            config.login_guard.lockout_time,
        )),
        config.login_guard.clone(),
    )
    .with_metrics(metrics);
    let state = Arc::new(state);

    let router = if config.enable_rate_limiting {
        info!(
            rps = config.rate_limit.general_rps,
            burst = config.rate_limit.general_burst,
            "Rate limiting enabled"
        );
        create_router_with_rate_limit(state, config.rate_limit.clone())
    } else {
        create_router(state)
    };

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("Server starting on http://{}", config.bind_addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
