use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use otp_auth_service::{
    build_router,
    config::AuthConfig,
    db,
    services::{spawn_expired_code_sweeper, Database, SmtpNotifier},
    AppState,
};
use service_core::observability::{init_metrics, init_tracing};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = AuthConfig::from_env().context("Invalid configuration")?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;
    let metrics = init_metrics()?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting OTP authentication service"
    );

    let pool = db::create_pool(&config.database)
        .await
        .context("Failed to connect to PostgreSQL")?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let store = Arc::new(Database::new(pool));
    let notifier = Arc::new(SmtpNotifier::new(&config.smtp).context("Invalid SMTP settings")?);

    let shutdown = CancellationToken::new();
    let sweeper = spawn_expired_code_sweeper(
        store.clone(),
        Duration::from_secs(config.otp.sweep_interval_seconds),
        shutdown.clone(),
    );

    let state = AppState::new(
        config.clone(),
        store.clone(),
        store.clone(),
        store,
        notifier,
        Some(metrics),
    );
    let app = build_router(state).await?;

    let addr = config.common.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .await?;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::error!(error = %e, "Expired code sweeper task failed");
    }

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    // Background tasks stop first; in-flight requests drain afterwards.
    shutdown.cancel();
}
