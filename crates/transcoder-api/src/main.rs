//! Axum API server binary.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use transcoder_api::{create_router, metrics, ApiConfig, ApiConsumer, AppState, StallDetector};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("transcoder_api=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("starting transcoder-api");

    let config = ApiConfig::from_env();
    info!("api config: host={}, port={}", config.host, config.port);

    let state = match AppState::new(config.clone()).await {
        Ok(s) => s,
        Err(e) => {
            error!("failed to create application state: {e}");
            std::process::exit(1);
        }
    };

    let metrics_enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    let metrics_handle = if metrics_enabled {
        info!("prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics())
    } else {
        None
    };

    // API-side Consumer feeds the Progress Tracker and Event Manager from
    // the broker's progress/results queues.
    let consumer = Arc::new(ApiConsumer::new(
        Arc::clone(&state.broker),
        state.jobs.clone(),
        Arc::clone(&state.progress),
        Arc::clone(&state.events),
    ));
    tokio::spawn(consumer.run());

    // Stall Detector sweeps in-progress jobs with no recent liveness.
    let stall_detector = StallDetector::new(
        state.jobs.clone(),
        Arc::clone(&state.progress),
        Arc::clone(&state.events),
        Arc::clone(&state.broker),
    );
    tokio::spawn(stall_detector.run());

    let app = create_router(state.clone(), metrics_handle);

    let addr: SocketAddr = format!("{}:{}", state.config.host, state.config.port)
        .parse()
        .expect("invalid bind address");

    info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .unwrap();

    info!("server shutdown complete");
}

/// Waits for SIGINT/SIGTERM; `axum::serve`'s own graceful shutdown then
/// stops accepting new connections and waits for in-flight requests to
/// drain, bounded by the runtime's own shutdown behavior.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("received shutdown signal");
    tokio::time::sleep(Duration::from_millis(100)).await;
}
