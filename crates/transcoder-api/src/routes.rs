//! API routes.

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::handlers::health::{health, ready};
use crate::handlers::jobs::{cancel_job, get_job, list_jobs, submit_job};
use crate::handlers::playlists::{create_playlist, get_playlist};
use crate::handlers::presets::{create_preset, delete_preset, get_preset, list_presets};
use crate::handlers::upload::{download, download_signed, upload};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers, RateLimiterCache,
};
use crate::state::AppState;
use crate::ws::subscribe;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let job_routes = Router::new()
        .route("/jobs", post(submit_job))
        .route("/jobs", get(list_jobs))
        .route("/jobs/:job_id", get(get_job))
        .route("/jobs/:job_id/cancel", post(cancel_job));

    let playlist_routes = Router::new()
        .route("/playlists", post(create_playlist))
        .route("/playlists/:playlist_id", get(get_playlist));

    let preset_routes = Router::new()
        .route("/presets", post(create_preset))
        .route("/presets", get(list_presets))
        .route("/presets/:preset_id", get(get_preset))
        .route("/presets/:preset_id", delete(delete_preset));

    let transfer_routes = Router::new()
        .route("/upload", post(upload))
        .route("/download/:key", get(download))
        .route("/download/:key/signed", get(download_signed));

    // Rate limiter applied to every route that isn't a probe or scrape
    // endpoint.
    let rate_limiter = std::sync::Arc::new(RateLimiterCache::new(state.config.rate_limit_rps));

    let api_routes = Router::new()
        .merge(job_routes)
        .merge(playlist_routes)
        .merge(preset_routes)
        .merge(transfer_routes)
        .layer(middleware::from_fn_with_state(
            rate_limiter.clone(),
            rate_limit_middleware,
        ));

    let subscription_routes = Router::new().route("/progress/:job_id", get(subscribe));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(api_routes)
        .merge(subscription_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
