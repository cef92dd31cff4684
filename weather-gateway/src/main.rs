use chrono::Duration;
use common::tracing::{init_tracing, init_tracing_pretty};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use weather_gateway::api_client::OpenMeteoClient;
use weather_gateway::cache::ForecastCache;
use weather_gateway::clock::{Clock, SystemClock};
use weather_gateway::config::Config;
use weather_gateway::validator::Validator;
use weather_gateway::{AppState, router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    if config.json_logs {
        init_tracing();
    } else {
        init_tracing_pretty();
    }

    let shutdown = CancellationToken::new();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let ttl = Duration::try_seconds(config.cache_ttl_seconds.try_into().unwrap_or(i64::MAX))
        .unwrap_or(Duration::MAX);
    let cache = Arc::new(ForecastCache::new(ttl, clock.clone()));

    let sweeper = (config.sweep_interval_seconds > 0).then(|| {
        cache.clone().spawn_sweeper(
            std::time::Duration::from_secs(config.sweep_interval_seconds),
            shutdown.clone(),
        )
    });

    let provider = Arc::new(OpenMeteoClient::new(
        config.geocoding_url.clone(),
        config.forecast_url.clone(),
        config.api_key.clone(),
        config.upstream_timeout_seconds,
    ));
    let validator = Validator::new(
        config
            .max_date_offset_days
            .map(|days| Duration::days(i64::from(days))),
    );

    let state = AppState {
        cache,
        provider,
        validator: Arc::new(validator),
        clock,
    };

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(
        ttl_seconds = config.cache_ttl_seconds,
        "Weather gateway starting on {}", addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    if let Some(sweeper) = sweeper {
        sweeper.await?;
    }

    info!("Weather gateway stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        },
    }

    shutdown.cancel();
    warn!("Stopped cache sweeper, shutting down gracefully...");
}
